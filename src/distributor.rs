//! The distributor's account: referral code, bank details and the clients
//! that subscribed through them.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use axum::{
    Form,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_htmx::HxRedirect;
use maud::{Markup, html};
use serde::Deserialize;
use time::{Date, macros::format_description};

use crate::{
    AppState, Error,
    alert::{AlertLog, Notifier, alerts_view},
    auth::{AuthStore, Role},
    endpoints,
    html::{
        BUTTON_PRIMARY_STYLE, CARD_STYLE, FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE,
        PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE, base,
    },
    navigation::Sidebar,
};

/// A client registered under a distributor, as listed by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientDistributor {
    /// The client's profile ID.
    pub id: String,
    /// The client's name.
    #[serde(rename = "nombre", default)]
    pub name: String,
    /// The client's contact phone number.
    #[serde(rename = "telefono_contacto", default)]
    pub contact_phone: Option<String>,
    /// The kind of business, e.g. "Restaurante".
    #[serde(rename = "tipo_negocio", default)]
    pub business_type: Option<String>,
    /// The business's trading name.
    #[serde(rename = "nombre_negocio", default)]
    pub business_name: Option<String>,
    /// One of "activa", "vencida", "cancelada" or "Inactivo".
    #[serde(rename = "suscripcion_estado", default)]
    pub subscription_status: Option<String>,
    /// When the subscription started.
    #[serde(rename = "suscripcion_fecha_inicio", default)]
    pub subscription_start: Option<String>,
    /// When the subscription ends.
    #[serde(rename = "suscripcion_fecha_fin", default)]
    pub subscription_end: Option<String>,
    /// The subscribed plan.
    #[serde(rename = "plan_nombre", default)]
    pub plan_name: Option<String>,
}

impl ClientDistributor {
    /// Whether the client's subscription is currently active.
    pub fn is_active(&self) -> bool {
        self.subscription_status.as_deref() == Some("activa")
    }
}

/// A distributor's settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DistributorConfig {
    /// The code clients enter when registering.
    #[serde(rename = "codigo_referido", default)]
    pub referral_code: Option<String>,
    /// Where commissions are deposited.
    #[serde(rename = "dato_bancario", default)]
    pub bank_details: Option<String>,
}

/// Reads and updates distributor data on the platform.
#[async_trait]
pub trait DistributorRepository: Send + Sync {
    /// Get the distributor's settings. `None` if they have not been created yet.
    async fn get_config(&self, distributor_id: &str) -> Result<Option<DistributorConfig>, Error>;

    /// Whether no other distributor uses `code`.
    async fn is_code_available(&self, code: &str) -> Result<bool, Error>;

    /// Replace the distributor's referral code.
    async fn update_referral_code(&self, distributor_id: &str, code: &str) -> Result<(), Error>;

    /// List the clients registered under the distributor.
    async fn list_clients(&self, distributor_id: &str) -> Result<Vec<ClientDistributor>, Error>;
}

/// Check that a referral code is usable: not empty and without whitespace.
///
/// # Errors
/// Returns [Error::InvalidReferralCode] otherwise.
pub fn validate_referral_code(code: &str) -> Result<String, Error> {
    let code = code.trim();

    if code.is_empty() || code.chars().any(char::is_whitespace) {
        return Err(Error::InvalidReferralCode);
    }

    Ok(code.to_owned())
}

/// The state needed for the distributor's pages.
#[derive(Clone)]
pub struct DistributorState {
    /// Who is signed in.
    pub auth_store: Arc<RwLock<AuthStore>>,
    /// The role the server was started for.
    pub configured_role: Role,
    /// The platform's distributor data.
    pub repository: Arc<dyn DistributorRepository>,
    /// Pending toasts.
    pub alerts: Arc<AlertLog>,
}

impl FromRef<AppState> for DistributorState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            auth_store: state.auth_store.clone(),
            configured_role: state.configured_role,
            repository: state.distributors.clone(),
            alerts: state.alerts.clone(),
        }
    }
}

impl DistributorState {
    fn distributor(&self) -> Result<(String, bool), Error> {
        if self.configured_role != Role::Distributor {
            return Err(Error::NotFound);
        }

        let store = self.auth_store.read().map_err(|error| {
            tracing::error!("could not acquire the auth store lock: {error}");
            Error::LockError
        })?;

        let id = store.viewer_id().ok_or(Error::NoSession)?.to_owned();

        Ok((id, store.sidebar_collapsed()))
    }
}

/// Render the distributor's account and client list.
pub async fn get_clients_page(State(state): State<DistributorState>) -> Response {
    let (distributor_id, sidebar_collapsed) = match state.distributor() {
        Ok(distributor) => distributor,
        Err(error) => return error.into_response(),
    };

    let config = match state.repository.get_config(&distributor_id).await {
        Ok(config) => config.unwrap_or_default(),
        Err(error) => {
            tracing::error!("Error fetching distributor config: {error}");
            DistributorConfig::default()
        }
    };

    let clients = match state.repository.list_clients(&distributor_id).await {
        Ok(clients) => clients,
        Err(error) => {
            tracing::error!("Error fetching distributor clients: {error}");
            state.alerts.error("Error al listar clientes");
            Vec::new()
        }
    };

    let sidebar = Sidebar::new(endpoints::DISTRIBUTOR_CLIENTS_VIEW, Role::Distributor)
        .collapsed(sidebar_collapsed)
        .into_html();
    let alerts = state.alerts.drain();

    let content = html! {
        div class="flex"
        {
            (sidebar)

            div class=(PAGE_CONTAINER_STYLE)
            {
                h1 class="text-3xl font-bold" { "Mis Clientes" }

                (account_view(&config))
                (clients_table_view(&clients))
            }
        }

        (alerts_view(&alerts))
    };

    base("Clientes", &content).into_response()
}

/// The form data for changing the referral code.
#[derive(Debug, Deserialize)]
pub struct ReferralCodeForm {
    /// The new code.
    pub codigo: String,
}

/// Change the distributor's referral code if no one else uses it.
pub async fn update_referral_code_endpoint(
    State(state): State<DistributorState>,
    Form(form): Form<ReferralCodeForm>,
) -> Response {
    let (distributor_id, _) = match state.distributor() {
        Ok(distributor) => distributor,
        Err(error) => return error.into_alert_response(),
    };

    let code = match validate_referral_code(&form.codigo) {
        Ok(code) => code,
        Err(error) => return error.into_alert_response(),
    };

    match state.repository.is_code_available(&code).await {
        Ok(true) => {}
        Ok(false) => return Error::ReferralCodeTaken(code).into_alert_response(),
        Err(error) => {
            tracing::error!("Error checking code availability: {error}");
            return error.into_alert_response();
        }
    }

    if let Err(error) = state
        .repository
        .update_referral_code(&distributor_id, &code)
        .await
    {
        tracing::error!("could not update the referral code of {distributor_id}: {error}");
        return error.into_alert_response();
    }

    tracing::info!("distributor {distributor_id} changed their referral code to {code}");
    state.alerts.success("Código de referido actualizado");

    (
        HxRedirect(endpoints::DISTRIBUTOR_CLIENTS_VIEW.to_owned()),
        StatusCode::SEE_OTHER,
    )
        .into_response()
}

fn account_view(config: &DistributorConfig) -> Markup {
    let referral_code = config.referral_code.as_deref().unwrap_or_default();

    html! {
        div class="grid gap-6 md:grid-cols-2"
        {
            div class=(CARD_STYLE)
            {
                h2 class="text-xl font-semibold mb-4" { "Datos Bancarios" }
                p class="text-sm text-gray-500" { "Cuenta para depósitos de comisiones" }
                p class="text-lg font-mono bg-gray-100 dark:bg-gray-700 p-2 rounded-md mt-2"
                {
                    (config.bank_details.as_deref().unwrap_or("Sin registrar"))
                }
            }

            div class=(CARD_STYLE)
            {
                h2 class="text-xl font-semibold mb-4" { "Código de Referido" }

                form
                    hx-post=(endpoints::DISTRIBUTOR_REFERRAL_CODE)
                    hx-target-error="#alert-container"
                    class="flex items-end gap-4"
                {
                    div class="flex-1"
                    {
                        label for="codigo" class=(FORM_LABEL_STYLE) { "Código" }

                        input
                            id="codigo"
                            type="text"
                            name="codigo"
                            value=(referral_code)
                            required
                            class=(FORM_TEXT_INPUT_STYLE);
                    }

                    button type="submit" class=(BUTTON_PRIMARY_STYLE) { "Guardar" }
                }
            }
        }
    }
}

fn format_subscription_date(text: &str) -> String {
    let day = text.get(..10).unwrap_or(text);

    match Date::parse(day, format_description!("[year]-[month]-[day]")) {
        Ok(date) => date
            .format(format_description!("[day]/[month]/[year]"))
            .unwrap_or_else(|_| text.to_owned()),
        Err(_) => text.to_owned(),
    }
}

fn clients_table_view(clients: &[ClientDistributor]) -> Markup {
    html! {
        div class="relative overflow-x-auto shadow-md rounded-lg"
        {
            table class="w-full text-sm text-left text-gray-500 dark:text-gray-400"
            {
                thead class=(TABLE_HEADER_STYLE)
                {
                    tr
                    {
                        th scope="col" class=(TABLE_CELL_STYLE) { "Nombre" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Teléfono" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Negocio" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Plan" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Estado" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Vigencia" }
                    }
                }

                tbody
                {
                    @for client in clients {
                        tr class=(TABLE_ROW_STYLE)
                        {
                            td class={(TABLE_CELL_STYLE) " font-medium text-gray-900 dark:text-white"}
                            {
                                (client.name)
                            }
                            td class=(TABLE_CELL_STYLE) { (client.contact_phone.as_deref().unwrap_or("-")) }
                            td class=(TABLE_CELL_STYLE)
                            {
                                (client.business_name.as_deref().unwrap_or("-"))
                                @if let Some(business_type) = &client.business_type {
                                    span class="block text-xs text-gray-400" { (business_type) }
                                }
                            }
                            td class=(TABLE_CELL_STYLE) { (client.plan_name.as_deref().unwrap_or("-")) }
                            td class=(TABLE_CELL_STYLE)
                            {
                                @if client.is_active() {
                                    span class="px-2 py-1 rounded-full text-xs bg-green-100 text-green-800" { "Activo" }
                                } @else {
                                    span class="px-2 py-1 rounded-full text-xs bg-red-100 text-red-800"
                                    {
                                        (client.subscription_status.as_deref().unwrap_or("Inactivo"))
                                    }
                                }
                            }
                            td class=(TABLE_CELL_STYLE)
                            {
                                (client.subscription_start.as_deref().map(format_subscription_date).unwrap_or_default())
                                " - "
                                (client.subscription_end.as_deref().map(format_subscription_date).unwrap_or_default())
                            }
                        }
                    }

                    @if clients.is_empty() {
                        tr class=(TABLE_ROW_STYLE)
                        {
                            td colspan="6" class="px-6 py-12 text-center" { "No hay clientes registrados." }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, RwLock};

    use axum::{Form, extract::State, http::StatusCode};
    use scraper::Selector;

    use crate::{
        Error,
        alert::AlertLog,
        auth::{AuthStore, Role, SignedInUser},
        distributor::{
            ClientDistributor, DistributorConfig, DistributorState, ReferralCodeForm,
            format_subscription_date, get_clients_page, update_referral_code_endpoint,
            validate_referral_code,
        },
        endpoints,
        test_utils::{
            FakeDistributors, assert_form_input_with_value, assert_hx_endpoint,
            assert_hx_redirect, assert_valid_html, must_get_form, parse_html_document,
        },
    };

    fn client(name: &str, status: &str) -> ClientDistributor {
        ClientDistributor {
            id: format!("client-{name}"),
            name: name.to_owned(),
            contact_phone: Some("987654321".to_owned()),
            business_type: Some("Restaurante".to_owned()),
            business_name: Some("El Buen Sabor".to_owned()),
            subscription_status: Some(status.to_owned()),
            subscription_start: Some("2024-01-01".to_owned()),
            subscription_end: Some("2024-02-01T00:00:00+00:00".to_owned()),
            plan_name: Some("Pro".to_owned()),
        }
    }

    fn state_with(distributors: Arc<FakeDistributors>, role: Role) -> DistributorState {
        let mut store = AuthStore::new();
        store.set_user(Some(SignedInUser::Platform {
            id: "dist-1".to_owned(),
            email: None,
        }));
        store.set_role(Some(Role::Distributor));

        DistributorState {
            auth_store: Arc::new(RwLock::new(store)),
            configured_role: role,
            repository: distributors,
            alerts: Arc::new(AlertLog::new()),
        }
    }

    #[test]
    fn referral_codes_must_be_one_word() {
        assert_eq!(Ok("ROSA24".to_owned()), validate_referral_code("  ROSA24 "));
        assert_eq!(Err(Error::InvalidReferralCode), validate_referral_code(""));
        assert_eq!(Err(Error::InvalidReferralCode), validate_referral_code("ROSA 24"));
    }

    #[test]
    fn subscription_dates_are_day_first() {
        assert_eq!("01/02/2024", format_subscription_date("2024-02-01T00:00:00+00:00"));
        assert_eq!("pronto", format_subscription_date("pronto"));
    }

    #[test]
    fn client_rows_deserialize_from_platform() {
        let client: ClientDistributor = serde_json::from_str(
            r#"{"id": "c1", "nombre": "Bodega Juanita", "suscripcion_estado": "activa"}"#,
        )
        .unwrap();

        assert!(client.is_active());
        assert_eq!(None, client.plan_name);
    }

    #[tokio::test]
    async fn page_lists_clients_and_code_form() {
        let distributors = Arc::new(FakeDistributors::new(
            Some(DistributorConfig {
                referral_code: Some("ROSA24".to_owned()),
                bank_details: Some("BCP: 191-12345678-0-99".to_owned()),
            }),
            vec![client("Rosa", "activa"), client("Juana", "vencida")],
        ));
        let state = state_with(distributors, Role::Distributor);

        let response = get_clients_page(State(state)).await;

        assert_eq!(StatusCode::OK, response.status());
        let html = parse_html_document(response).await;
        assert_valid_html(&html);
        let rows = html.select(&Selector::parse("tbody tr").unwrap()).count();
        assert_eq!(2, rows);
        let form = must_get_form(&html);
        assert_hx_endpoint(&form, endpoints::DISTRIBUTOR_REFERRAL_CODE, "hx-post");
        assert_form_input_with_value(&form, "codigo", "text", "ROSA24");
    }

    #[tokio::test]
    async fn page_shows_empty_state() {
        let distributors = Arc::new(FakeDistributors::new(None, Vec::new()));
        let state = state_with(distributors, Role::Distributor);

        let response = get_clients_page(State(state)).await;

        let html = parse_html_document(response).await;
        let text: String = html
            .select(&Selector::parse("tbody td").unwrap())
            .flat_map(|cell| cell.text())
            .collect();
        assert_eq!("No hay clientes registrados.", text);
    }

    #[tokio::test]
    async fn page_is_hidden_for_other_roles() {
        let distributors = Arc::new(FakeDistributors::new(None, Vec::new()));
        let state = state_with(distributors, Role::Admin);

        let response = get_clients_page(State(state)).await;

        assert_eq!(StatusCode::NOT_FOUND, response.status());
    }

    #[tokio::test]
    async fn available_code_is_saved() {
        let distributors = Arc::new(FakeDistributors::new(None, Vec::new()));
        let state = state_with(distributors.clone(), Role::Distributor);

        let response = update_referral_code_endpoint(
            State(state),
            Form(ReferralCodeForm {
                codigo: "ROSA24".to_owned(),
            }),
        )
        .await;

        assert_eq!(StatusCode::SEE_OTHER, response.status());
        assert_hx_redirect(&response, endpoints::DISTRIBUTOR_CLIENTS_VIEW);
        assert_eq!(
            vec![("dist-1".to_owned(), "ROSA24".to_owned())],
            distributors.updates()
        );
    }

    #[tokio::test]
    async fn taken_code_is_rejected() {
        let distributors = Arc::new(FakeDistributors::new(None, Vec::new()));
        distributors.take_code("ROSA24");
        let state = state_with(distributors.clone(), Role::Distributor);

        let response = update_referral_code_endpoint(
            State(state),
            Form(ReferralCodeForm {
                codigo: "ROSA24".to_owned(),
            }),
        )
        .await;

        assert_eq!(StatusCode::BAD_REQUEST, response.status());
        assert!(distributors.updates().is_empty());
    }

    #[tokio::test]
    async fn blank_code_is_rejected_without_checking() {
        let distributors = Arc::new(FakeDistributors::new(None, Vec::new()));
        let state = state_with(distributors.clone(), Role::Distributor);

        let response = update_referral_code_endpoint(
            State(state),
            Form(ReferralCodeForm {
                codigo: "   ".to_owned(),
            }),
        )
        .await;

        assert_eq!(StatusCode::BAD_REQUEST, response.status());
        assert!(distributors.updates().is_empty());
    }
}
