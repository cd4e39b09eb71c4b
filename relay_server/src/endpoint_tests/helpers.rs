use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web::ServiceConfig, App};
use log::debug;

use crate::webhook_routes::SIGNATURE_HEADER;

/// Posts a raw notification body to `/webhook` against a service assembled by `configure`. The configure function
/// registers the pipeline options and the mocked ledger, order source and sink, so each test states exactly the
/// interactions it expects.
pub async fn post_notification(
    body: &str,
    signature: Option<&str>,
    configure: fn(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    let mut req = TestRequest::post()
        .uri("/webhook")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body.to_string());
    if let Some(sig) = signature {
        req = req.insert_header((SIGNATURE_HEADER, sig.to_string()));
    }
    let req = req.to_request();
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    debug!("Posting notification");
    let res = test::try_call_service(&service, req).await.map_err(|e| e.to_string())?;
    // Handler errors no longer surface as service-level errors in current actix-web; they are attached to the
    // response instead, so lift them back into the Err channel the tests expect.
    if let Some(err) = res.response().error() {
        return Err(err.to_string());
    }
    let (_, res) = res.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    Ok((status, body))
}
