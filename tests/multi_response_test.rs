use merchant_gateways::domain::error::GatewayError;
use merchant_gateways::domain::multi_response::{MultiResponse, UseResponse};
use merchant_gateways::domain::response::Response;
use std::sync::atomic::{AtomicBool, Ordering};

fn ok(message: &str) -> Response {
    Response::new(true, message).with_authorization(Some(format!("auth-{message}")))
}

fn failed(message: &str) -> Response {
    Response::new(false, message)
}

async fn step(response: Response) -> Result<Response, GatewayError> {
    Ok(response)
}

#[tokio::test]
async fn first_policy_keeps_the_first_success() {
    let mut multi = MultiResponse::new(UseResponse::First);
    multi.process(|| step(ok("one"))).await.unwrap();
    multi.process(|| step(ok("two"))).await.unwrap();

    assert!(multi.success());
    assert_eq!(multi.responses().len(), 2);
    assert_eq!(multi.message(), Some("one"));
    assert_eq!(multi.authorization(), Some("auth-one"));
}

#[tokio::test]
async fn last_policy_reports_the_latest_step() {
    let mut multi = MultiResponse::new(UseResponse::Last);
    multi.process(|| step(ok("one"))).await.unwrap();
    multi.process(|| step(ok("two"))).await.unwrap();

    assert_eq!(multi.message(), Some("two"));
    assert_eq!(multi.authorization(), Some("auth-two"));
}

#[tokio::test]
async fn a_failed_step_becomes_primary_even_under_first_policy() {
    let mut multi = MultiResponse::new(UseResponse::First);
    multi.process(|| step(ok("one"))).await.unwrap();
    multi.process(|| step(failed("declined"))).await.unwrap();

    assert!(!multi.success());
    assert_eq!(multi.message(), Some("declined"));
}

#[tokio::test]
async fn steps_after_a_failure_are_skipped() {
    let ran = AtomicBool::new(false);
    let mut multi = MultiResponse::new(UseResponse::First);
    multi.process(|| step(failed("declined"))).await.unwrap();
    multi
        .process(|| {
            ran.store(true, Ordering::SeqCst);
            step(ok("never"))
        })
        .await
        .unwrap();

    assert!(!ran.load(Ordering::SeqCst));
    assert_eq!(multi.responses().len(), 1);
    assert!(!multi.success());
}

#[tokio::test]
async fn ignored_steps_are_recorded_but_never_primary() {
    let mut multi = MultiResponse::new(UseResponse::Last);
    multi.process(|| step(ok("auth"))).await.unwrap();
    multi
        .process_ignoring_result(|| step(failed("void failed")))
        .await
        .unwrap();

    assert!(multi.success());
    assert_eq!(multi.message(), Some("auth"));
    assert_eq!(multi.responses().len(), 2);
}

#[tokio::test]
async fn errors_propagate_from_steps() {
    let mut multi = MultiResponse::new(UseResponse::First);
    let result = multi
        .process(|| async { Err(GatewayError::Connection("reset".into())) })
        .await;

    assert!(matches!(result, Err(GatewayError::Connection(_))));
    assert!(multi.responses().is_empty());
}

#[tokio::test]
async fn nested_multi_responses_are_flattened() {
    let mut inner = MultiResponse::new(UseResponse::First);
    inner.process(|| step(ok("a"))).await.unwrap();
    inner.process(|| step(ok("b"))).await.unwrap();
    let composed = inner.into_response();
    assert_eq!(composed.steps.len(), 2);

    let mut outer = MultiResponse::new(UseResponse::Last);
    outer.process(|| step(composed)).await.unwrap();

    assert_eq!(outer.responses().len(), 2);
    assert_eq!(outer.message(), Some("a"));
    assert!(outer.responses().iter().all(|r| r.steps.is_empty()));
}

#[tokio::test]
async fn empty_chain_is_a_bare_success() {
    let multi = MultiResponse::new(UseResponse::First);
    assert!(multi.success());
    assert!(multi.primary_response().is_none());

    let response = multi.into_response();
    assert!(response.success);
    assert_eq!(response.message, "");
    assert!(response.steps.is_empty());
}

#[tokio::test]
async fn into_response_carries_every_step() {
    let mut multi = MultiResponse::new(UseResponse::First);
    multi.process(|| step(ok("auth"))).await.unwrap();
    multi.process_ignoring_result(|| step(ok("void"))).await.unwrap();

    let response = multi.into_response();
    assert_eq!(response.message, "auth");
    assert_eq!(response.steps.len(), 2);
    assert_eq!(response.steps[1].message, "void");
}
