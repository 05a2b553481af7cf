//! Scripted gateway and fixtures shared by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};

use crate::db::RecipeRepository;
use crate::models::{
    Addition, AdditionStage, HopAddition, LocalRecipe, Malt, MashRest, Milli, YeastPitch,
};
use crate::session::{
    CookieJar, Gateway, GatewayError, GatewayRequest, GatewayResponse,
    MemoryStateStore, Method, SessionManager, SessionState, DEFAULT_APP_URL, DEFAULT_AUTH_URL,
};

pub const AUTH: &str = DEFAULT_AUTH_URL;
pub const APP: &str = DEFAULT_APP_URL;

type Reply = Result<GatewayResponse, GatewayError>;

#[derive(Default)]
struct Script {
    queued: VecDeque<Reply>,
    last: Option<Reply>,
}

/// Replies are queued per `METHOD url`; once a queue runs dry its last reply
/// repeats. Unscripted requests get a 404.
#[derive(Default)]
pub struct MockGateway {
    scripts: Mutex<HashMap<String, Script>>,
    requests: Mutex<Vec<GatewayRequest>>,
}

fn key(method: Method, url: &str) -> String {
    format!("{method} {url}")
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, method: Method, url: &str, response: GatewayResponse) {
        self.push(method, url, Ok(response));
    }

    pub fn fail(&self, method: Method, url: &str, error: GatewayError) {
        self.push(method, url, Err(error));
    }

    fn push(&self, method: Method, url: &str, reply: Reply) {
        self.scripts
            .lock()
            .unwrap()
            .entry(key(method, url))
            .or_default()
            .queued
            .push_back(reply);
    }

    pub fn requests(&self) -> Vec<GatewayRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.method == method)
            .count()
    }

    /// Requests other than GET.
    pub fn writes(&self) -> usize {
        self.count(Method::Post) + self.count(Method::Put) + self.count(Method::Delete)
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn send(&self, request: GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        let key = key(request.method, &request.url);
        self.requests.lock().unwrap().push(request);

        let mut scripts = self.scripts.lock().unwrap();
        let Some(script) = scripts.get_mut(&key) else {
            return Ok(GatewayResponse::new(404, format!("unscripted {key}")));
        };
        if let Some(reply) = script.queued.pop_front() {
            script.last = Some(reply.clone());
            return reply;
        }
        script
            .last
            .clone()
            .unwrap_or_else(|| Ok(GatewayResponse::new(404, format!("unscripted {key}"))))
    }
}

pub fn login_form_html(form_key: &str) -> GatewayResponse {
    GatewayResponse::new(
        200,
        format!(
            r#"<html><form id="login-form"><input name="form_key" type="hidden" value="{form_key}" /></form></html>"#
        ),
    )
    .with_header("Set-Cookie", "frontend=abc123; Domain=.grainfather.com; Path=/; HttpOnly")
}

pub fn landing_html(csrf_token: &str, api_token: &str) -> GatewayResponse {
    let metadata = json!({"csrfToken": csrf_token, "user": {"id": 1, "api_token": api_token}});
    GatewayResponse::new(
        200,
        format!("<html><script>\nwindow.Grainfather = {metadata};\n</script></html>"),
    )
}

/// Script a successful login handshake.
pub fn script_login(gateway: &MockGateway) {
    gateway.on(
        Method::Get,
        &format!("{AUTH}/customer/account/login/"),
        login_form_html("fk123"),
    );
    gateway.on(
        Method::Post,
        &format!("{AUTH}/customer/account/loginPost/"),
        GatewayResponse::redirect(format!("{AUTH}/customer/account/")),
    );
    gateway.on(
        Method::Get,
        &format!("{AUTH}/customer/account/"),
        GatewayResponse::new(200, "<html>account</html>"),
    );
    gateway.on(Method::Get, &format!("{APP}/"), landing_html("csrf-1", "api-1"));
}

pub fn listing_page(entries: &[(i64, &str)], next: Option<&str>) -> GatewayResponse {
    let data: Vec<Value> = entries
        .iter()
        .map(|(id, name)| {
            json!({
                "id": id,
                "name": name,
                "updated_at": "2024-03-01 10:00:00",
                "is_public": false,
                "batch_size": 20,
                "unit_type_id": 10
            })
        })
        .collect();
    GatewayResponse::new(200, json!({"data": data, "next_page_url": next}).to_string())
}

pub fn sample_state(account: &str) -> SessionState {
    let mut cookies = CookieJar::new();
    cookies.store(&format!("{APP}/"), "session=persisted; Path=/", 1_700_000_000);
    SessionState {
        account: account.to_string(),
        csrf_token: "csrf-0".to_string(),
        api_token: Some("api-0".to_string()),
        cookies,
        metadata: json!({"csrfToken": "csrf-0"}),
        saved_at: 1_700_000_000,
    }
}

pub fn authenticated_session(gateway: MockGateway) -> SessionManager<MockGateway, MemoryStateStore> {
    let state = sample_state("brewer");
    SessionManager::authenticated(gateway, MemoryStateStore::with_state(state.clone()), state)
}

/// Fixed local recipes.
pub struct StaticRepository {
    recipes: Vec<LocalRecipe>,
}

impl StaticRepository {
    pub fn new(recipes: Vec<LocalRecipe>) -> Self {
        Self { recipes }
    }
}

impl RecipeRepository for StaticRepository {
    fn fetch_all_recipes(&self) -> crate::Result<Vec<LocalRecipe>> {
        Ok(self.recipes.clone())
    }
}

pub fn sample_recipe(id: i64, name: &str) -> LocalRecipe {
    let timestamp = NaiveDate::from_ymd_opt(2024, 3, 1)
        .and_then(|date| date.and_hms_opt(10, 0, 0))
        .unwrap();

    LocalRecipe {
        id,
        name: name.to_string(),
        comment: String::new(),
        created_at: timestamp,
        modified_at: timestamp,
        batch_volume: Milli::from_int(20),
        boil_volume: Milli::from_int(23),
        pre_strain_volume: Milli::from_raw(21_500),
        bottled_volume: Milli::from_int(20),
        boil_minutes: 60,
        original_plato: Milli::from_raw(12_500),
        final_plato: Some(Milli::from_int(3)),
        abv: Milli::from_raw(5_100),
        efficiency_percent: Milli::from_int(72),
        ibu: Milli::from_int(30),
        color_ebc: Milli::from_int(8),
        malts: vec![
            Malt {
                name: "Munich".to_string(),
                share_percent: Milli::from_int(30),
                color_ebc: Milli::from_int(15),
                amount_kg: Milli::from_raw(1_200),
            },
            Malt {
                name: "Pilsner".to_string(),
                share_percent: Milli::from_int(70),
                color_ebc: Milli::from_raw(3_500),
                amount_kg: Milli::from_raw(2_800),
            },
        ],
        hops: vec![
            HopAddition {
                name: "Cascade".to_string(),
                alpha: Milli::from_raw(6_500),
                pellets: true,
                amount_g: Milli::from_int(40),
                minutes: 0,
                first_wort: false,
            },
            HopAddition {
                name: "Magnum".to_string(),
                alpha: Milli::from_int(14),
                pellets: true,
                amount_g: Milli::from_int(20),
                minutes: 60,
                first_wort: true,
            },
            HopAddition {
                name: "Cascade".to_string(),
                alpha: Milli::from_raw(6_500),
                pellets: true,
                amount_g: Milli::from_int(30),
                minutes: 10,
                first_wort: false,
            },
        ],
        additions: vec![
            Addition {
                name: "Irish Moss".to_string(),
                is_hop: false,
                yield_percent: Milli::ZERO,
                color_ebc: Milli::ZERO,
                amount_g: Milli::from_int(5),
                stage: AdditionStage::Boil,
                duration_minutes: 15,
                hop: None,
            },
            Addition {
                name: "Honey".to_string(),
                is_hop: false,
                yield_percent: Milli::from_int(75),
                color_ebc: Milli::from_int(5),
                amount_g: Milli::from_int(500),
                stage: AdditionStage::Fermentation,
                duration_minutes: 0,
                hop: None,
            },
        ],
        yeast: Some(YeastPitch {
            name: "US-05".to_string(),
            units: Milli::from_int(2),
            attenuation_percent: Some(81),
            dry: true,
            package: Some("11,5 g".to_string()),
        }),
        mash_steps: vec![MashRest {
            name: "Verzuckerung".to_string(),
            temperature: Milli::from_int(67),
            minutes: 60,
        }],
        fermentation_steps: Vec::new(),
    }
}
