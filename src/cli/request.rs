//! CLI handler for `bearer-relay request`.

use reqwest::Method;

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::http::RequestDescriptor;
use crate::refresh::SessionEvent;
use crate::session::AuthenticatedClient;

use super::RequestArgs;

/// Handle `bearer-relay request <METHOD> <PATH>`.
pub async fn handle_request(
    config: RelayConfig,
    args: &RequestArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = AuthenticatedClient::new(config)?;
    client.on_session_event(|event| {
        if let SessionEvent::Ended { reason, .. } = event {
            eprintln!("⚠️  Session ended ({reason}); run `bearer-relay login` again");
        }
    });

    let descriptor = build_descriptor(args)?;
    let response = client.execute(descriptor).await?;
    let status = response.status();
    let body = response.text().await?;

    eprintln!("{status}");
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        Err(_) if !body.is_empty() => println!("{body}"),
        Err(_) => {}
    }
    if !status.is_success() {
        return Err(format!("request failed with status {status}").into());
    }
    Ok(())
}

/// Translate CLI arguments into a request.
pub fn build_descriptor(args: &RequestArgs) -> Result<RequestDescriptor, RelayError> {
    let method = Method::from_bytes(args.method.to_ascii_uppercase().as_bytes())
        .map_err(|_| RelayError::InvalidRequest(format!("invalid method: {}", args.method)))?;
    let mut descriptor = RequestDescriptor::new(method, args.path.clone());
    for pair in &args.query {
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            RelayError::InvalidRequest(format!("query must be key=value, got {pair:?}"))
        })?;
        descriptor = descriptor.with_query(key, value);
    }
    if let Some(raw) = &args.json {
        descriptor = descriptor.with_json(serde_json::from_str(raw)?);
    }
    Ok(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::RequestBody;

    fn args(method: &str, query: &[&str], json: Option<&str>) -> RequestArgs {
        RequestArgs {
            method: method.to_string(),
            path: "users/cash/analysis".to_string(),
            json: json.map(str::to_string),
            query: query.iter().map(|q| q.to_string()).collect(),
        }
    }

    #[test]
    fn builds_descriptor_from_args() {
        let descriptor = build_descriptor(&args(
            "post",
            &["start_date=2024-01-01"],
            Some(r#"{"period":"year"}"#),
        ))
        .unwrap();
        assert_eq!(descriptor.method, Method::POST);
        assert_eq!(
            descriptor.query,
            vec![("start_date".to_string(), "2024-01-01".to_string())]
        );
        assert_eq!(
            descriptor.body,
            Some(RequestBody::Json(serde_json::json!({"period": "year"})))
        );
    }

    #[test]
    fn rejects_malformed_query() {
        let result = build_descriptor(&args("GET", &["no-equals"], None));
        assert!(matches!(result, Err(RelayError::InvalidRequest(_))));
    }

    #[test]
    fn rejects_invalid_json_body() {
        let result = build_descriptor(&args("GET", &[], Some("{oops")));
        assert!(matches!(result, Err(RelayError::Serialization(_))));
    }
}
