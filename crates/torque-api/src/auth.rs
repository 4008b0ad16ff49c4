use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use torque_core::SaleCoordinator;
use torque_db::models::{EmployeeRow, OwnerRow};
use torque_db::{Database, is_unique_violation};
use torque_gateway::dispatcher::Dispatcher;
use torque_types::api::{Claims, LoginRequest, LoginResponse};
use torque_types::session::Role;
use torque_webhook::WebhookClient;

use crate::error::{ApiError, ApiResult};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub coordinator: SaleCoordinator<WebhookClient>,
    pub dispatcher: Dispatcher,
    pub jwt_secret: String,
    /// The shared key employees must present to register or log in.
    pub verification_key: String,
}

/// Run blocking DB work off the async runtime.
pub(crate) async fn run_db<T, F>(state: &AppState, f: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(Arc<Database>) -> anyhow::Result<T> + Send + 'static,
{
    let db = state.db.clone();
    tokio::task::spawn_blocking(move || f(db))
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("blocking join error: {}", e)))?
        .map_err(ApiError::Internal)
}

enum LoginDecision {
    Owner(EmployeeRow, OwnerRow),
    Employee(EmployeeRow),
    Registered(EmployeeRow),
    InvalidOwnerCredentials,
    InvalidSharedKey,
    Blocked(Option<String>),
    InvalidEmployeeCredentials,
    DuplicateDiscordId,
}

/// The single combined register/login flow.
///
/// Order matters: the owners table is consulted first (owner credentials
/// never touch the shared key), then the shared key gates everything
/// else, then an existing employee is matched or a new one registered.
/// Owners get a shadow employee record on first login so they can
/// transact sales.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let character_name = req.character_name.trim().to_lowercase();
    let discord_id = req.discord_id.trim().to_string();
    let key = req.verification_key.trim().to_uppercase();

    if character_name.is_empty() || discord_id.is_empty() || key.is_empty() {
        return Err(ApiError::BadRequest(
            "character name, Discord user ID and verification key are required".into(),
        ));
    }

    let shared_key = state.verification_key.to_uppercase();
    let decision = run_db(&state, move |db| {
        if let Some(owner) = db.get_owner_by_name(&character_name)? {
            if owner.discord_id == discord_id && owner.verification_key.to_uppercase() == key {
                // Lazily create the owner's shadow employee record.
                let shadow = match db.get_employee_by_discord_id(&owner.discord_id)? {
                    Some(row) => row,
                    None => db.create_employee(
                        &Uuid::new_v4().to_string(),
                        &owner.character_name,
                        &owner.discord_id,
                        &owner.verification_key,
                    )?,
                };
                return Ok(LoginDecision::Owner(shadow, owner));
            }
            return Ok(LoginDecision::InvalidOwnerCredentials);
        }

        if shared_key.is_empty() || shared_key != key {
            return Ok(LoginDecision::InvalidSharedKey);
        }

        if let Some(employee) = db.get_employee_by_name(&character_name)? {
            if employee.is_blocked {
                return Ok(LoginDecision::Blocked(employee.block_reason));
            }
            if employee.discord_id == discord_id
                && employee.verification_key.to_uppercase() == key
            {
                return Ok(LoginDecision::Employee(employee));
            }
            return Ok(LoginDecision::InvalidEmployeeCredentials);
        }

        match db.create_employee(&Uuid::new_v4().to_string(), &character_name, &discord_id, &key) {
            Ok(row) => Ok(LoginDecision::Registered(row)),
            Err(e) if is_unique_violation(&e) => Ok(LoginDecision::DuplicateDiscordId),
            Err(e) => Err(e),
        }
    })
    .await?;

    let (row, owner_row, role, status) = match decision {
        LoginDecision::Owner(row, owner) => (row, Some(owner), Role::Owner, StatusCode::OK),
        LoginDecision::Employee(row) => (row, None, Role::Employee, StatusCode::OK),
        LoginDecision::Registered(row) => (row, None, Role::Employee, StatusCode::CREATED),
        LoginDecision::InvalidOwnerCredentials | LoginDecision::InvalidEmployeeCredentials => {
            return Err(ApiError::Unauthorized(
                "Invalid credentials. Please check your Discord user ID and verification key."
                    .into(),
            ));
        }
        LoginDecision::InvalidSharedKey => {
            return Err(ApiError::Unauthorized(
                "Invalid verification key. Please ask your owner for the correct key.".into(),
            ));
        }
        LoginDecision::Blocked(reason) => {
            return Err(ApiError::Forbidden(format!(
                "Your account has been blocked. Reason: {}. Please contact the owner.",
                reason.as_deref().unwrap_or("No reason provided")
            )));
        }
        LoginDecision::DuplicateDiscordId => {
            return Err(ApiError::Conflict("This Discord ID is already registered.".into()));
        }
    };

    let employee = row.into_employee();
    let token = create_token(
        &state.jwt_secret,
        employee.id,
        &employee.character_name,
        &employee.discord_id,
        role,
    )
    .map_err(ApiError::Internal)?;

    Ok((
        status,
        Json(LoginResponse {
            token,
            role,
            employee,
            owner: owner_row.map(|r| r.into_owner()),
        }),
    ))
}

fn create_token(
    secret: &str,
    employee_id: Uuid,
    character_name: &str,
    discord_id: &str,
    role: Role,
) -> anyhow::Result<String> {
    let claims = Claims {
        sub: employee_id,
        character_name: character_name.to_string(),
        discord_id: discord_id.to_string(),
        role,
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> AppState {
        let db = Arc::new(Database::open_in_memory().unwrap());
        Arc::new(AppStateInner {
            coordinator: SaleCoordinator::new(db.clone(), WebhookClient::new(None)),
            dispatcher: Dispatcher::new(),
            jwt_secret: "test-secret".into(),
            verification_key: "SHOP-KEY".into(),
            db,
        })
    }

    fn seed_owner(state: &AppState, name: &str, discord_id: &str, key: &str) {
        state
            .db
            .with_conn_mut(|conn| {
                conn.execute(
                    "INSERT INTO owners (id, character_name, discord_id, verification_key)
                     VALUES (?1, ?2, ?3, ?4)",
                    (Uuid::new_v4().to_string(), name, discord_id, key),
                )?;
                Ok(())
            })
            .unwrap();
    }

    fn request(name: &str, discord_id: &str, key: &str) -> Json<LoginRequest> {
        Json(LoginRequest {
            character_name: name.into(),
            discord_id: discord_id.into(),
            verification_key: key.into(),
        })
    }

    #[tokio::test]
    async fn first_login_registers_a_new_employee() {
        let state = test_state();
        let result = login(State(state.clone()), request("Mara Vey", "445566", "shop-key")).await;
        assert!(result.is_ok());

        let row = state.db.get_employee_by_name("mara vey").unwrap().unwrap();
        assert_eq!(row.discord_id, "445566");
        assert_eq!(row.verification_key, "SHOP-KEY");
    }

    #[tokio::test]
    async fn wrong_shared_key_is_rejected() {
        let state = test_state();
        let result = login(State(state), request("mara vey", "445566", "WRONG-KEY")).await;
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn blocked_employees_are_told_why() {
        let state = test_state();
        login(State(state.clone()), request("mara vey", "445566", "SHOP-KEY"))
            .await
            .unwrap();
        let row = state.db.get_employee_by_name("mara vey").unwrap().unwrap();
        state
            .db
            .block_employee(&row.id, "selling to rivals", &torque_db::sqlite_now())
            .unwrap();

        let result = login(State(state), request("mara vey", "445566", "SHOP-KEY")).await;
        match result {
            Err(ApiError::Forbidden(message)) => assert!(message.contains("selling to rivals")),
            other => panic!("expected Forbidden, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn owner_login_creates_the_shadow_employee() {
        let state = test_state();
        seed_owner(&state, "boss hale", "990011", "DRAGON-9");

        let result = login(State(state.clone()), request("Boss Hale", "990011", "dragon-9")).await;
        assert!(result.is_ok());

        let shadow = state.db.get_employee_by_discord_id("990011").unwrap().unwrap();
        assert_eq!(shadow.character_name, "boss hale");

        // A second login reuses the shadow record.
        login(State(state.clone()), request("boss hale", "990011", "DRAGON-9"))
            .await
            .unwrap();
        let employees = state.db.list_employees_excluding_discord_id("none").unwrap();
        assert_eq!(employees.len(), 1);
    }

    #[tokio::test]
    async fn owner_with_wrong_discord_id_is_rejected() {
        let state = test_state();
        seed_owner(&state, "boss hale", "990011", "DRAGON-9");

        let result = login(State(state), request("boss hale", "000000", "DRAGON-9")).await;
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn duplicate_discord_id_conflicts() {
        let state = test_state();
        login(State(state.clone()), request("mara vey", "445566", "SHOP-KEY"))
            .await
            .unwrap();

        let result = login(State(state), request("someone else", "445566", "SHOP-KEY")).await;
        assert!(matches!(result, Err(ApiError::Conflict(_))));
    }
}
