//! Integration tests against `PermissionsController`'s public API only.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;

use warden::{
    Config, OriginMetadata, Outcome, PermissionRequest, PermissionsController, Request,
    RequestUserApproval, RestrictedMethodDescriptor,
};

fn echo_handler() -> warden::Handler {
    Arc::new(|req: Request| Box::pin(async move { warden::Response::ok(req.params_value()) }))
}

fn accounts_handler() -> warden::Handler {
    Arc::new(|_req: Request| Box::pin(async move { warden::Response::ok(json!(["0xA", "0xB", "0xC"])) }))
}

fn approve_all() -> RequestUserApproval {
    Arc::new(|req: PermissionRequest| Box::pin(async move { Ok(req.permissions) }))
}

fn reject_all() -> RequestUserApproval {
    Arc::new(|_req: PermissionRequest| Box::pin(async move { Ok(HashMap::new()) }))
}

fn new_controller(approval: RequestUserApproval) -> PermissionsController {
    let mut restricted = HashMap::new();
    restricted.insert(
        "readContacts".to_string(),
        RestrictedMethodDescriptor {
            description: "Read your contacts".into(),
            method: echo_handler(),
        },
    );
    restricted.insert(
        "readAccounts".to_string(),
        RestrictedMethodDescriptor {
            description: "Read your accounts".into(),
            method: accounts_handler(),
        },
    );
    PermissionsController::new(Config {
        safe_methods: vec!["eth_chainId".into()],
        restricted_methods: restricted,
        method_prefix: "wallet_".into(),
        request_user_approval: Some(approval),
    })
    .unwrap()
}

#[tokio::test]
async fn restricted_call_is_denied_before_any_grant() {
    let controller = new_controller(approve_all());
    let outcome = controller
        .handle_request(OriginMetadata::new("https://dapp.example"), Request::new("readContacts", vec![]))
        .await;
    match outcome {
        Outcome::Handled(res) => assert_eq!(res.error.unwrap().code, 4100),
        Outcome::PassThrough => panic!("restricted methods must never pass through"),
    }
}

#[tokio::test]
async fn request_permissions_handshake_then_dispatch_succeeds() {
    let controller = new_controller(approve_all());
    let origin = OriginMetadata::new("https://dapp.example");

    let grant = controller
        .handle_request(
            origin.clone(),
            Request::new("wallet_requestPermissions", vec![json!({"readContacts": {}})]),
        )
        .await;
    let Outcome::Handled(res) = grant else { panic!("expected handled") };
    assert!(res.error.is_none());
    let caps = res.result.unwrap();
    assert_eq!(caps.as_array().unwrap().len(), 1);

    let call = controller
        .handle_request(origin, Request::new("readContacts", vec![json!(["hello"])]))
        .await;
    match call {
        Outcome::Handled(res) => assert_eq!(res.result.unwrap(), json!(["hello"])),
        Outcome::PassThrough => panic!("expected handled"),
    }
}

#[tokio::test]
async fn rejected_request_permissions_grants_nothing_and_later_calls_stay_denied() {
    let controller = new_controller(reject_all());
    let origin = OriginMetadata::new("https://dapp.example");

    let rejection = controller
        .handle_request(
            origin.clone(),
            Request::new("wallet_requestPermissions", vec![json!({"readContacts": {}})]),
        )
        .await;
    match rejection {
        Outcome::Handled(res) => assert_eq!(res.error.unwrap().code, 4001),
        Outcome::PassThrough => panic!("expected handled"),
    }

    let call = controller
        .handle_request(origin, Request::new("readContacts", vec![]))
        .await;
    match call {
        Outcome::Handled(res) => assert_eq!(res.error.unwrap().code, 4100),
        Outcome::PassThrough => panic!("expected handled"),
    }
}

#[tokio::test]
async fn caveat_filters_the_response_on_dispatch() {
    let controller = new_controller(approve_all());
    let origin = OriginMetadata::new("https://dapp.example");

    controller
        .handle_request(
            origin.clone(),
            Request::new(
                "wallet_requestPermissions",
                vec![json!({"readAccounts": {"caveats": [{"type": "filterResponse", "value": ["0xA", "0xB"]}]}})],
            ),
        )
        .await;

    let call = controller
        .handle_request(origin, Request::new("readAccounts", vec![]))
        .await;
    match call {
        Outcome::Handled(res) => assert_eq!(res.result.unwrap(), json!(["0xA", "0xB"])),
        Outcome::PassThrough => panic!("expected handled"),
    }
}

#[tokio::test]
async fn safe_method_never_reaches_the_restricted_dispatch_path() {
    let controller = new_controller(approve_all());
    let outcome = controller
        .handle_request(OriginMetadata::new("https://dapp.example"), Request::new("eth_chainId", vec![]))
        .await;
    assert!(matches!(outcome, Outcome::PassThrough));
}

#[tokio::test]
async fn admin_surface_reflects_grants_made_through_the_handshake() {
    let controller = new_controller(approve_all());
    let origin = OriginMetadata::new("https://dapp.example");

    controller
        .handle_request(
            origin.clone(),
            Request::new("wallet_requestPermissions", vec![json!({"readContacts": {}})]),
        )
        .await;

    let domains = controller.get_domains().await;
    assert!(domains.contains_key("https://dapp.example"));

    let caps = controller.get_permissions_for_domain(&origin.origin).await;
    assert_eq!(caps.len(), 1);
    assert_eq!(caps[0].parent_capability, "readContacts");

    controller.remove_permissions_for(&origin.origin, &["readContacts".to_string()]).await;
    assert!(controller.get_domains().await.is_empty());
}

#[test]
fn missing_approval_function_is_refused_at_construction() {
    let result = PermissionsController::new(Config::default());
    assert!(result.is_err());
}
