use askama::Template;
use askama_web::WebTemplate;

#[derive(Template, WebTemplate)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub connected: bool,
    pub user_id: Option<String>,
    pub history_enabled: bool,
}
