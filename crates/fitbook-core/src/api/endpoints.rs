//! Typed calls for each backend endpoint.
//!
//! All of them go through [`SessionClient::request`], so they share bearer
//! attachment and the refresh-once behaviour.

use reqwest::StatusCode;
use tracing::{debug, info};

use super::client::{RequestSpec, SessionClient};
use super::error::ApiError;
use crate::auth::LoginResponse;
use crate::models::{
    Booking, BookingRequest, ClassForm, FitnessClass, FitnessPlan, NewUser, PlanRequest, User,
};

impl SessionClient {
    // ===== Auth =====

    /// Log in and store the returned tokens and user profile
    pub async fn login(&self, username: &str, password: &str) -> Result<Option<User>, ApiError> {
        let spec = RequestSpec::post("/login/")
            .anonymous()
            .body(serde_json::json!({ "username": username, "password": password }));

        let response = self.request(spec).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(auth_failure(status, &body, "Failed to login"));
        }

        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse login response: {}", e)))?;

        self.session()
            .store_login(&login)
            .map_err(|e| ApiError::Storage(e.to_string()))?;

        info!(username = username, "Login successful");
        Ok(login.user)
    }

    /// Create an account. Validates the form before sending.
    pub async fn register(&self, user: &NewUser) -> Result<(), ApiError> {
        user.validate()?;

        let spec = RequestSpec::post("/register/").anonymous().body(user.to_body());
        let response = self.request(spec).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(auth_failure(status, &body, "Failed to register"));
        }

        info!(username = %user.username, "Registration successful");
        Ok(())
    }

    /// Forget stored credentials. Local only; the backend keeps no session.
    pub fn logout(&self) -> Result<(), ApiError> {
        self.session()
            .logout()
            .map_err(|e| ApiError::Storage(e.to_string()))
    }

    // ===== Classes =====

    /// Fetch all classes, with times rendered for `timezone`
    pub async fn list_classes(&self, timezone: &str) -> Result<Vec<FitnessClass>, ApiError> {
        let classes: Vec<FitnessClass> = self
            .request_json(RequestSpec::get("/classes/").query("timezone", timezone))
            .await?;
        debug!(count = classes.len(), "Classes fetched");
        Ok(classes)
    }

    /// Classes with at least one open slot
    pub async fn available_classes(&self, timezone: &str) -> Result<Vec<FitnessClass>, ApiError> {
        let classes = self.list_classes(timezone).await?;
        Ok(classes.into_iter().filter(|c| c.has_availability()).collect())
    }

    pub async fn get_class(&self, id: i64) -> Result<FitnessClass, ApiError> {
        self.request_json(RequestSpec::get(format!("/classes/{}/", id)))
            .await
    }

    pub async fn create_class(&self, form: &ClassForm) -> Result<FitnessClass, ApiError> {
        form.validate()?;
        self.request_json(RequestSpec::post("/classes/").json(form)?)
            .await
    }

    pub async fn update_class(&self, id: i64, form: &ClassForm) -> Result<FitnessClass, ApiError> {
        form.validate()?;
        self.request_json(RequestSpec::put(format!("/classes/{}/", id)).json(form)?)
            .await
    }

    // ===== Bookings =====

    pub async fn list_bookings(&self) -> Result<Vec<Booking>, ApiError> {
        let bookings: Vec<Booking> = self.request_json(RequestSpec::get("/bookings/")).await?;
        debug!(count = bookings.len(), "Bookings fetched");
        Ok(bookings)
    }

    pub async fn create_booking(&self, request: &BookingRequest) -> Result<(), ApiError> {
        request.validate()?;
        self.request_empty(RequestSpec::post("/bookings/").json(request)?)
            .await?;
        info!(class_id = request.class_id, slots = request.slots, "Booking created");
        Ok(())
    }

    /// Cancel a booking. The backend takes the id in the request body.
    pub async fn cancel_booking(&self, id: i64) -> Result<(), ApiError> {
        self.request_empty(RequestSpec::delete("/bookings/").body(serde_json::json!({ "id": id })))
            .await?;
        info!(booking_id = id, "Booking cancelled");
        Ok(())
    }

    // ===== Fitness plans =====

    pub async fn list_plans(&self) -> Result<Vec<FitnessPlan>, ApiError> {
        self.request_json(RequestSpec::get("/fitness-plans/")).await
    }

    /// Ask the AI assistant to generate and save a new plan
    pub async fn generate_plan(&self, request: &PlanRequest) -> Result<FitnessPlan, ApiError> {
        let plan: FitnessPlan = self
            .request_json(RequestSpec::post("/ai-assistance/").json(request)?)
            .await?;
        info!(plan_id = plan.id, days = plan.plan_details.len(), "Plan generated");
        Ok(plan)
    }
}

/// Error for a failed login/register call: the backend's `error` field, or `fallback`
fn auth_failure(status: StatusCode, body: &str, fallback: &str) -> ApiError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| fallback.to_string());

    match status.as_u16() {
        500..=599 => ApiError::ServerError(message),
        code => ApiError::BadRequest { status: code, message },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;
    use mockito::{Matcher, Server, ServerGuard};

    use super::*;
    use crate::auth::{MemoryStore, Session, SessionEvent};

    fn client_for(server: &ServerGuard) -> SessionClient {
        SessionClient::new(
            server.url(),
            format!("{}/token/refresh/", server.url()),
            Duration::from_secs(5),
            Session::new(Arc::new(MemoryStore::new())),
        )
        .unwrap()
    }

    async fn logged_in(server: &mut ServerGuard, client: &SessionClient) {
        let _m = server
            .mock("POST", "/login/")
            .with_status(200)
            .with_body(r#"{"access":"acc-1","refresh":"ref-1","user":{"id":1,"username":"asha"}}"#)
            .create_async()
            .await;
        client.login("asha", "secret1").await.unwrap();
    }

    #[tokio::test]
    async fn test_login_stores_session_and_authorizes_next_call() {
        let mut server = Server::new_async().await;
        let login = server
            .mock("POST", "/login/")
            .match_header("authorization", Matcher::Missing)
            .match_body(Matcher::Json(serde_json::json!({"username":"asha","password":"secret1"})))
            .with_status(200)
            .with_body(r#"{"access":"acc-1","refresh":"ref-1","user":{"id":1,"username":"asha"}}"#)
            .expect(1)
            .create_async()
            .await;
        let classes = server
            .mock("GET", "/classes/")
            .match_query(Matcher::UrlEncoded("timezone".into(), "Asia/Kolkata".into()))
            .match_header("authorization", "Bearer acc-1")
            .with_status(200)
            .with_body(r#"[{"id":1,"name":"Yoga","available_slots":3},{"id":2,"name":"HIIT","available_slots":0}]"#)
            .expect(2)
            .create_async()
            .await;

        let client = client_for(&server);
        let mut events = client.session().subscribe();

        let user = client.login("asha", "secret1").await.unwrap();
        assert_eq!(user.map(|u| u.username), Some("asha".to_string()));
        assert_eq!(client.session().refresh_token().as_deref(), Some("ref-1"));
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::LoggedIn { username: Some("asha".to_string()) }
        );

        assert_eq!(client.list_classes("Asia/Kolkata").await.unwrap().len(), 2);
        let available = client.available_classes("Asia/Kolkata").await.unwrap();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].id, 1);

        login.assert_async().await;
        classes.assert_async().await;
    }

    #[tokio::test]
    async fn test_login_failure_message() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/login/")
            .with_status(401)
            .with_body(r#"{"error":"Invalid credentials"}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        match client.login("asha", "wrong").await.unwrap_err() {
            ApiError::BadRequest { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Invalid credentials");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!client.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_register_validates_before_sending() {
        let mut server = Server::new_async().await;
        let m = server.mock("POST", "/register/").expect(0).create_async().await;

        let client = client_for(&server);
        let err = client.register(&NewUser::default()).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_register_failure_falls_back_to_default_message() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/register/")
            .match_body(Matcher::PartialJson(serde_json::json!({"profile":{"role":"client"}})))
            .with_status(400)
            .with_body(r#"{"username":["taken"]}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let user = NewUser {
            username: "asha".to_string(),
            email: "asha@example.com".to_string(),
            phone_number: "9876543210".to_string(),
            role: "client".to_string(),
            password: "secret1".to_string(),
            confirm_password: "secret1".to_string(),
        };
        match client.register(&user).await.unwrap_err() {
            ApiError::BadRequest { message, .. } => assert_eq!(message, "Failed to register"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancel_booking_sends_id_in_body() {
        let mut server = Server::new_async().await;
        let client = client_for(&server);
        logged_in(&mut server, &client).await;

        let m = server
            .mock("DELETE", "/bookings/")
            .match_header("authorization", "Bearer acc-1")
            .match_body(Matcher::Json(serde_json::json!({"id": 42})))
            .with_status(204)
            .expect(1)
            .create_async()
            .await;

        client.cancel_booking(42).await.unwrap();
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_booking_surfaces_business_error() {
        let mut server = Server::new_async().await;
        let client = client_for(&server);
        logged_in(&mut server, &client).await;

        let _m = server
            .mock("POST", "/bookings/")
            .match_body(Matcher::Json(serde_json::json!({"class_id": 3, "slots": 2})))
            .with_status(400)
            .with_body(r#"{"non_field_errors":["Not enough slots available"]}"#)
            .create_async()
            .await;

        let err = client
            .create_booking(&BookingRequest { class_id: 3, slots: 2 })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Request failed (400): Not enough slots available");
    }

    #[tokio::test]
    async fn test_update_class_puts_to_class_path() {
        let mut server = Server::new_async().await;
        let client = client_for(&server);
        logged_in(&mut server, &client).await;

        let m = server
            .mock("PUT", "/classes/5/")
            .match_body(Matcher::PartialJson(serde_json::json!({"name":"Pilates","Location":"Hall B"})))
            .with_status(200)
            .with_body(r#"{"id":5,"name":"Pilates","Location":"Hall B"}"#)
            .expect(1)
            .create_async()
            .await;

        let form = ClassForm {
            name: "Pilates".to_string(),
            date_time: Utc::now() + chrono::Duration::days(2),
            duration: 45,
            instructor: "Meera".to_string(),
            total_slots: 12,
            difficulty: "Intermediate".to_string(),
            location: "Hall B".to_string(),
        };
        let updated = client.update_class(5, &form).await.unwrap();
        assert_eq!(updated.location.as_deref(), Some("Hall B"));
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_generate_plan_posts_defaults() {
        let mut server = Server::new_async().await;
        let client = client_for(&server);
        logged_in(&mut server, &client).await;

        let m = server
            .mock("POST", "/ai-assistance/")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "plan_name": "Summer",
                "duration": 30,
                "budget": 2000,
                "goal": "lose weight",
                "level": "Beginner"
            })))
            .with_status(201)
            .with_body(r#"{"id":9,"plan_name":"Summer","plan_details":[{"day":1,"status":"completed"}]}"#)
            .expect(1)
            .create_async()
            .await;

        let request = PlanRequest {
            plan_name: "Summer".to_string(),
            ..Default::default()
        };
        let plan = client.generate_plan(&request).await.unwrap();
        assert_eq!(plan.id, 9);
        assert_eq!(plan.progress_percent(), 100);
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_logout_clears_session() {
        let mut server = Server::new_async().await;
        let client = client_for(&server);
        logged_in(&mut server, &client).await;
        assert!(client.session().is_authenticated());

        client.logout().unwrap();
        assert!(!client.session().is_authenticated());
        assert!(client.session().user().is_none());
    }
}
