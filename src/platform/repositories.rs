//! The platform's queries behind the application's repository traits.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{
    Error,
    auth::Role,
    distributor::{ClientDistributor, DistributorConfig, DistributorRepository},
    platform::PlatformClient,
    profile::{AdminProfile, ProfileRepository},
    transaction::{TransactionRecord, TransactionRepository},
};

fn rfc3339(instant: OffsetDateTime) -> Result<String, Error> {
    instant
        .format(&Rfc3339)
        .map_err(|error| Error::Http(format!("could not format {instant}: {error}")))
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

#[async_trait]
impl TransactionRepository for PlatformClient {
    async fn get_transactions_by_date(
        &self,
        viewer_id: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<TransactionRecord>, Error> {
        let records: Option<Vec<TransactionRecord>> = self
            .rpc(
                "get_transactions_by_date",
                json!({
                    "p_user_id": viewer_id,
                    "p_start_date": rfc3339(start)?,
                    "p_end_date": rfc3339(end)?,
                }),
            )
            .await?;

        Ok(records.unwrap_or_default())
    }
}

#[derive(Debug, Deserialize)]
struct RoleRow {
    rol: Option<String>,
}

#[async_trait]
impl ProfileRepository for PlatformClient {
    async fn get_role(&self, user_id: &str) -> Result<Option<Role>, Error> {
        let rows: Vec<RoleRow> = self
            .select("perfil", &[("select", "rol".to_owned()), ("id", eq(user_id))])
            .await?;

        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.rol)
            .and_then(|role| Role::parse(&role)))
    }

    async fn get_admin_profile(&self, admin_id: &str) -> Result<Option<AdminProfile>, Error> {
        let rows: Vec<AdminProfile> = self
            .select(
                "perfil",
                &[
                    ("select", "nombre,filtro_busqueda_web".to_owned()),
                    ("id", eq(admin_id)),
                ],
            )
            .await?;

        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl DistributorRepository for PlatformClient {
    async fn get_config(&self, distributor_id: &str) -> Result<Option<DistributorConfig>, Error> {
        let rows: Vec<DistributorConfig> = self
            .select(
                "distribuidor_config",
                &[
                    ("select", "codigo_referido,dato_bancario".to_owned()),
                    ("id_perfil", eq(distributor_id)),
                ],
            )
            .await?;

        Ok(rows.into_iter().next())
    }

    async fn is_code_available(&self, code: &str) -> Result<bool, Error> {
        self.rpc("fn_codigo_distribuidor_disponible", json!({ "_codigo": code }))
            .await
    }

    async fn update_referral_code(&self, distributor_id: &str, code: &str) -> Result<(), Error> {
        self.update(
            "distribuidor_config",
            &[("id_perfil", eq(distributor_id))],
            json!({ "codigo_referido": code }),
        )
        .await
    }

    async fn list_clients(&self, distributor_id: &str) -> Result<Vec<ClientDistributor>, Error> {
        let clients: Option<Vec<ClientDistributor>> = self
            .rpc(
                "fn_listar_clientes_por_distribuidor",
                json!({ "p_id_distribuidor": distributor_id }),
            )
            .await?;

        Ok(clients.unwrap_or_default())
    }
}
