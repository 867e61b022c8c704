#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use axum::Router;
    use chrono::Utc;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::commands::crop::{create_crop, get_crop};
    use crate::commands::farm::{create_farm, delete_farm};
    use crate::commands::reading::{create_reading, get_reading, list_readings, DEFAULT_READING_HOURS, MAX_READING_HOURS};
    use crate::commands::satellite::{create_satellite_data, get_satellite_data};
    use crate::commands::sensor::{create_sensor, get_sensor};
    use crate::commands::zone::{create_zone, get_zone};
    use crate::error::AgriTechError;
    use crate::models::{CropStatus, CropType, Lookback, NewCrop, NewSensorReading, NewUser, NewZone, Pagination};
    use crate::test_support::{
        new_farm, new_image, new_sensor, seed_superuser, seed_user, test_app, TEST_PASSWORD,
    };

    fn candidate(username: &str, email: &str, password: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            username: username.to_string(),
            full_name: format!("{} Farmer", username),
            password: password.to_string(),
            phone: None,
            bio: None,
            location: None,
        }
    }

    async fn body_json(res: Response) -> Value {
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    fn authed(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token));
        match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn login(app: &Router, username: &str, password: &str) -> Response {
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/auth/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(format!("username={}&password={}", username, password)))
            .unwrap();
        send(app, request).await
    }

    async fn token_for(app: &Router, username: &str) -> String {
        let res = login(app, username, TEST_PASSWORD).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        body["data"]["access_token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_alice_registration_and_login() {
        let (_, state) = test_app().await;
        let auth = &state.auth;

        let before = Utc::now();
        let alice = auth
            .register(candidate("alice", "alice@x.com", "secret1"))
            .await
            .unwrap();

        let token = auth.login("alice", "secret1").await.unwrap();
        assert_eq!(token.token_type, "bearer");
        let resolved = auth.resolve(&token.access_token).await.unwrap();
        assert_eq!(resolved.id, alice.id);
        assert!(resolved.last_login.unwrap() >= before);

        assert!(matches!(
            auth.login("alice", "wrongpass").await,
            Err(AgriTechError::Unauthenticated)
        ));
        assert!(matches!(
            auth.login("nobody", "secret1").await,
            Err(AgriTechError::Unauthenticated)
        ));

        assert!(matches!(
            auth.register(candidate("bob", "alice@x.com", "secret2")).await,
            Err(AgriTechError::DuplicateEmail)
        ));
        assert!(matches!(
            auth.register(candidate("alice", "bob@x.com", "secret2")).await,
            Err(AgriTechError::DuplicateUsername)
        ));
    }

    #[tokio::test]
    async fn test_farm_sensor_reading_lifecycle() {
        let (_, state) = test_app().await;
        let pool = &state.pool;
        let alice = seed_user(pool, "alice").await;

        let farm = create_farm(pool, new_farm("F1"), alice.id).await.unwrap();
        let sensor = create_sensor(pool, new_sensor(farm.id, "S1")).await.unwrap();
        let reading = create_reading(
            pool,
            sensor.id,
            NewSensorReading {
                value: 23.5,
                unit: None,
                quality_score: None,
                reading_timestamp: None,
                temperature: None,
                humidity: None,
                metadata: None,
            },
            Some(alice.id),
        )
        .await
        .unwrap();

        let window = Lookback::hours(Some(24), DEFAULT_READING_HOURS, MAX_READING_HOURS).unwrap();
        let readings = list_readings(pool, sensor.id, window, Pagination::default(), Utc::now())
            .await
            .unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].id, reading.id);
        assert_eq!(readings[0].value, 23.5);

        delete_farm(pool, farm.id).await.unwrap();
        assert!(matches!(
            get_sensor(pool, sensor.id).await,
            Err(AgriTechError::NotFound("sensor"))
        ));
        assert!(matches!(
            get_reading(pool, reading.id).await,
            Err(AgriTechError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_farm_delete_cascades_to_every_child() {
        let (_, state) = test_app().await;
        let pool = &state.pool;
        let alice = seed_user(pool, "alice").await;
        let farm = create_farm(pool, new_farm("F1"), alice.id).await.unwrap();

        let zone = create_zone(
            pool,
            farm.id,
            NewZone {
                name: "North".into(),
                description: None,
                area_hectares: Some(2.0),
                soil_ph: None,
                soil_moisture: None,
                fertility_level: None,
            },
        )
        .await
        .unwrap();
        let crop = create_crop(
            pool,
            NewCrop {
                name: "Wheat".into(),
                variety: None,
                description: None,
                crop_type: CropType::Cereals,
                scientific_name: None,
                planting_date: None,
                expected_harvest_date: None,
                status: CropStatus::Planned,
                planted_area_hectares: None,
                expected_yield_kg: Some(4000.0),
                maturity_days: None,
                optimal_temperature_min: None,
                optimal_temperature_max: None,
                optimal_humidity_min: None,
                optimal_humidity_max: None,
                water_requirements_mm: None,
                farm_id: farm.id,
                zone_id: Some(zone.id),
                metadata: None,
            },
        )
        .await
        .unwrap();
        let image = create_satellite_data(pool, new_image(farm.id, Utc::now())).await.unwrap();

        delete_farm(pool, farm.id).await.unwrap();
        assert!(matches!(get_zone(pool, zone.id).await, Err(AgriTechError::NotFound(_))));
        assert!(matches!(get_crop(pool, crop.id).await, Err(AgriTechError::NotFound(_))));
        assert!(matches!(
            get_satellite_data(pool, image.id).await,
            Err(AgriTechError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_http_register_login_and_profile() {
        let (app, _) = test_app().await;

        let register = Request::builder()
            .method("POST")
            .uri("/api/v1/auth/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({
                    "email": "alice@x.com",
                    "username": "alice",
                    "full_name": "Alice Farmer",
                    "password": "secret1"
                })
                .to_string(),
            ))
            .unwrap();
        let res = send(&app, register).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["data"]["username"], json!("alice"));
        assert!(body["data"].get("hashed_password").is_none());

        let res = login(&app, "alice", "wrongpass").await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = login(&app, "alice", "secret1").await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body["data"]["token_type"], json!("bearer"));
        let token = body["data"]["access_token"].as_str().unwrap().to_string();

        let res = send(&app, authed("GET", "/api/v1/users/me", &token, None)).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await["data"]["email"], json!("alice@x.com"));

        let res = send(
            &app,
            authed("PUT", "/api/v1/users/me", &token, Some(json!({ "location": "Giza" }))),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body["data"]["location"], json!("Giza"));
        assert_eq!(body["data"]["full_name"], json!("Alice Farmer"));
    }

    #[tokio::test]
    async fn test_http_missing_token_is_challenged() {
        let (app, _) = test_app().await;

        let request = Request::builder().uri("/api/v1/farms").body(Body::empty()).unwrap();
        let res = send(&app, request).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(res.headers().get(header::WWW_AUTHENTICATE).unwrap(), "Bearer");
        assert_eq!(body_json(res).await["success"], json!(false));

        let res = send(&app, authed("GET", "/api/v1/farms", "not-a-token", None)).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_http_farm_crud_and_errors() {
        let (app, state) = test_app().await;
        let alice = seed_user(&state.pool, "alice").await;
        let token = token_for(&app, "alice").await;

        let res = send(
            &app,
            authed("POST", "/api/v1/farms", &token, Some(json!({ "name": "Oasis" }))),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body["data"]["owner_id"], json!(alice.id));
        assert_eq!(body["data"]["status"], json!("active"));
        let farm_id = body["data"]["id"].as_i64().unwrap();

        let res = send(
            &app,
            authed(
                "PUT",
                &format!("/api/v1/farms/{}", farm_id),
                &token,
                Some(json!({ "area_hectares": 40.0 })),
            ),
        )
        .await;
        let body = body_json(res).await;
        assert_eq!(body["data"]["area_hectares"], json!(40.0));
        assert_eq!(body["data"]["name"], json!("Oasis"));

        let res = send(&app, authed("GET", "/api/v1/farms?limit=5000", &token, None)).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = send(&app, authed("GET", "/api/v1/farms/9999", &token, None)).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(res).await["error"], json!("farm not found"));

        let res = send(
            &app,
            authed("POST", "/api/v1/farms", &token, Some(json!({ "name": "X", "status": "flooded" }))),
        )
        .await;
        assert!(res.status().is_client_error());

        let res = send(&app, authed("DELETE", &format!("/api/v1/farms/{}", farm_id), &token, None)).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            body_json(res).await["data"],
            json!({ "id": farm_id, "deleted": true })
        );
    }

    #[tokio::test]
    async fn test_http_superuser_routes() {
        let (app, state) = test_app().await;
        seed_user(&state.pool, "alice").await;
        let bob = seed_user(&state.pool, "bob").await;
        seed_superuser(&state.pool, "root").await;

        let alice_token = token_for(&app, "alice").await;
        let res = send(&app, authed("GET", "/api/v1/users", &alice_token, None)).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let root_token = token_for(&app, "root").await;
        let res = send(&app, authed("GET", "/api/v1/users?limit=2", &root_token, None)).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await["data"].as_array().unwrap().len(), 2);

        let res = send(
            &app,
            authed("DELETE", &format!("/api/v1/users/{}", bob.id), &root_token, None),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_http_triggers_return_receipts() {
        let (app, state) = test_app().await;
        let alice = seed_user(&state.pool, "alice").await;
        let farm = create_farm(&state.pool, new_farm("F1"), alice.id).await.unwrap();
        let sensor = create_sensor(&state.pool, new_sensor(farm.id, "S1")).await.unwrap();
        let token = token_for(&app, "alice").await;

        let res = send(
            &app,
            authed("POST", &format!("/api/v1/sensors/{}/calibrate", sensor.id), &token, None),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body["data"]["task"], json!("calibrate_sensor"));
        assert_eq!(body["data"]["status"], json!("processing"));

        let res = send(
            &app,
            authed("POST", &format!("/api/v1/analytics/reports/{}", farm.id), &token, None),
        )
        .await;
        assert_eq!(body_json(res).await["data"]["task"], json!("generate_farm_report"));

        let res = send(&app, authed("POST", "/api/v1/analytics/yield/999", &token, None)).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_probes_sit_outside_the_prefix() {
        let (app, _) = test_app().await;
        let res = send(&app, Request::builder().uri("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body["status"], json!("healthy"));
        assert!(body.get("success").is_none());
    }
}
