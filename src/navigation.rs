//! The sidebar with the links available to the signed in role.

use maud::{Markup, html};

use crate::{auth::Role, endpoints};

/// A link in the sidebar.
///
/// It will change appearance if `is_current` is set to
/// `true`. Only one link should be set as active at any one time.
#[derive(Clone)]
struct Link<'a> {
    url: &'a str,
    title: &'a str,
    is_current: bool,
}

impl Link<'_> {
    fn into_html(self, collapsed: bool) -> Markup {
        let style = if self.is_current {
            "flex items-center p-3 rounded-lg text-white bg-white/10"
        } else {
            "flex items-center p-3 rounded-lg text-zinc-400 hover:text-white hover:bg-white/10"
        };

        html! {
            a href=(self.url) class=(style) title=(self.title)
            {
                @if collapsed {
                    (self.title.get(..1).unwrap_or_default())
                } @else {
                    (self.title)
                }
            }
        }
    }
}

// (url, title, roles that see the link)
const ROUTES: &[(&str, &str, &[Role])] = &[
    (
        endpoints::MONITOR_VIEW,
        "Monitor",
        &[Role::Admin, Role::Helper],
    ),
    (
        endpoints::DISTRIBUTOR_CLIENTS_VIEW,
        "Clientes",
        &[Role::Distributor],
    ),
];

/// The navigation sidebar.
pub struct Sidebar<'a> {
    active_endpoint: &'a str,
    links: Vec<Link<'a>>,
    collapsed: bool,
}

impl Sidebar<'_> {
    /// Get the sidebar for `role`.
    ///
    /// If a link matches `active_endpoint`, then that link will be
    /// marked as active and displayed differently in the HTML.
    pub fn new(active_endpoint: &str, role: Role) -> Sidebar<'_> {
        let links = ROUTES
            .iter()
            .filter(|(_, _, roles)| roles.contains(&role))
            .map(|&(url, title, _)| Link {
                url,
                title,
                is_current: active_endpoint == url,
            })
            .collect();

        Sidebar {
            active_endpoint,
            links,
            collapsed: false,
        }
    }

    /// Show only the first letter of each link.
    pub fn collapsed(mut self, collapsed: bool) -> Self {
        self.collapsed = collapsed;
        self
    }

    pub fn into_html(self) -> Markup {
        let width = if self.collapsed { "w-16" } else { "w-56" };
        let collapsed = self.collapsed;

        html! {
            nav
                id="sidebar"
                class={"flex flex-col min-h-screen py-4 px-2 space-y-2 bg-slate-900 text-white " (width)}
            {
                button
                    hx-post=(endpoints::SIDEBAR_PREFERENCE)
                    hx-target="#sidebar"
                    hx-swap="outerHTML"
                    name="active"
                    value=(self.active_endpoint)
                    aria-label="Contraer menú"
                    class="self-end px-2 py-1 text-zinc-400 hover:text-white"
                {
                    @if collapsed { "»" } @else { "«" }
                }

                @for link in self.links {
                    (link.into_html(collapsed))
                }

                div class="flex-1" {}

                button
                    hx-post=(endpoints::LOG_OUT)
                    hx-target-error="#alert-container"
                    class="flex items-center p-3 rounded-lg text-zinc-400 hover:text-white hover:bg-white/10"
                {
                    @if collapsed { "⏻" } @else { "Cerrar sesión" }
                }
            }
        }
    }
}
