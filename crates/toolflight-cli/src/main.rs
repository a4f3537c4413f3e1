use std::future::Future;
use std::io::{self, Write};
use std::process;
use std::sync::Arc;

use anyhow::Context;
use toolflight::{
    ErrorRegistry, HttpTransport, HttpTransportConfig, Invoker, InvokerConfig, Params,
    ToolCallResult, telemetry,
};

#[derive(Debug)]
struct Args {
    tool: String,
    params: Params,
    endpoint: Option<String>,
    category: Option<String>,
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();

    let args = match parse_args(&args) {
        Ok(v) => v,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("error: {msg}");
                eprintln!();
            }
            eprintln!(
                "Usage: toolflight <tool> [--params <json>] [--endpoint <url>] [--category <name>]"
            );
            eprintln!();
            eprintln!("Arguments:");
            eprintln!("  <tool>              Name of the tool to call");
            eprintln!();
            eprintln!("Options:");
            eprintln!("  --params <json>     Tool arguments as a JSON object [default: {{}}]");
            eprintln!("  --endpoint <url>    JSON-RPC endpoint [env: TOOLFLIGHT_ENDPOINT]");
            eprintln!("  --category <name>   Error category [env: TOOLFLIGHT_ERROR_CATEGORY]");
            eprintln!();
            eprintln!("Press Ctrl+C while the call is running to cancel it.");
            process::exit(2);
        }
    };

    telemetry::init_tracing();

    match run(args, tokio::signal::ctrl_c(), &mut io::stdout()).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(1);
        }
    }
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut tool: Option<String> = None;
    let mut params = Params::new();
    let mut endpoint = None;
    let mut category = None;

    let mut i = 1; // skip argv[0]
    while i < args.len() {
        match args[i].as_str() {
            "--params" => {
                i += 1;
                let raw = args.get(i).ok_or("--params requires a value")?;
                params = parse_params(raw)?;
            }
            "--endpoint" => {
                i += 1;
                endpoint = Some(args.get(i).ok_or("--endpoint requires a value")?.clone());
            }
            "--category" => {
                i += 1;
                category = Some(args.get(i).ok_or("--category requires a value")?.clone());
            }
            "--help" | "-h" => return Err(String::new()),
            arg if arg.starts_with('-') => return Err(format!("unknown flag: {arg}")),
            arg => {
                if tool.is_some() {
                    return Err(format!("unexpected argument: {arg}"));
                }
                tool = Some(arg.to_string());
            }
        }
        i += 1;
    }

    let tool = tool.ok_or("missing required argument: <tool>")?;
    Ok(Args {
        tool,
        params,
        endpoint,
        category,
    })
}

fn parse_params(raw: &str) -> Result<Params, String> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(_) => Err("--params must be a JSON object".to_string()),
        Err(e) => Err(format!("invalid --params JSON: {e}")),
    }
}

/// Run one tool call, cancelling it if `interrupt` resolves first.
///
/// Results are written to `out` as pretty JSON. Returns the exit code.
async fn run(
    args: Args,
    interrupt: impl Future<Output = io::Result<()>>,
    out: &mut impl Write,
) -> anyhow::Result<i32> {
    let mut transport_config = HttpTransportConfig::default();
    if let Some(endpoint) = args.endpoint {
        transport_config.endpoint = endpoint;
    }
    let transport =
        Arc::new(HttpTransport::new(transport_config).context("failed to create HTTP client")?);
    tracing::debug!(endpoint = %transport.endpoint(), "Using HTTP transport");

    let mut config = InvokerConfig::default();
    if let Some(category) = args.category {
        config.error_category = category;
    }
    let category = config.error_category.clone();

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ToolCallResult>();
    let errors = Arc::new(ErrorRegistry::new());
    let invoker =
        Invoker::new(transport.clone(), Arc::new(tx), errors.clone()).with_config(config);

    let call = invoker.invoke(&args.tool, args.params);
    tokio::pin!(call);

    let interrupted = tokio::select! {
        _ = &mut call => false,
        signal = interrupt => {
            signal.context("failed to install Ctrl+C handler")?;
            true
        }
    };

    if interrupted {
        tracing::info!("Received SIGINT, cancelling tool call...");
        invoker.cancel_active();
        call.await;
    }
    transport.shutdown().await;

    while let Ok(result) = rx.try_recv() {
        writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?;
    }
    out.flush()?;

    Ok(if errors.contains(&category) { 1 } else { 0 })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        std::iter::once("toolflight")
            .chain(args.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn parses_tool_only() {
        let args = parse_args(&argv(&["echo"])).unwrap();
        assert_eq!(args.tool, "echo");
        assert!(args.params.is_empty());
        assert!(args.endpoint.is_none());
        assert!(args.category.is_none());
    }

    #[test]
    fn parses_all_flags() {
        let args = parse_args(&argv(&[
            "--endpoint",
            "http://localhost:9000/mcp",
            "search",
            "--params",
            r#"{"query": "rust"}"#,
            "--category",
            "search",
        ]))
        .unwrap();

        assert_eq!(args.tool, "search");
        assert_eq!(args.params["query"], "rust");
        assert_eq!(args.endpoint.as_deref(), Some("http://localhost:9000/mcp"));
        assert_eq!(args.category.as_deref(), Some("search"));
    }

    #[test]
    fn rejects_missing_tool() {
        let err = parse_args(&argv(&[])).unwrap_err();
        assert_eq!(err, "missing required argument: <tool>");
    }

    #[test]
    fn rejects_second_positional() {
        let err = parse_args(&argv(&["a", "b"])).unwrap_err();
        assert_eq!(err, "unexpected argument: b");
    }

    #[test]
    fn rejects_unknown_flag() {
        let err = parse_args(&argv(&["echo", "--verbose"])).unwrap_err();
        assert_eq!(err, "unknown flag: --verbose");
    }

    #[test]
    fn rejects_flag_without_value() {
        let err = parse_args(&argv(&["echo", "--params"])).unwrap_err();
        assert_eq!(err, "--params requires a value");
    }

    #[test]
    fn params_must_be_object() {
        assert_eq!(
            parse_params("[1, 2]").unwrap_err(),
            "--params must be a JSON object"
        );
        assert!(parse_params("{").unwrap_err().starts_with("invalid --params JSON"));
    }

    #[test]
    fn help_is_empty_error() {
        assert_eq!(parse_args(&argv(&["-h"])).unwrap_err(), "");
    }

    mod cli_run {
        use super::*;
        use std::future::Future;
        use std::io;
        use std::time::Duration;

        use serde_json::{Value, json};
        use toolflight::CANCELLED_MESSAGE;
        use wiremock::matchers::{body_partial_json, method};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        fn args_for(server: &MockServer, tool: &str) -> Args {
            Args {
                tool: tool.to_string(),
                params: Params::new(),
                endpoint: Some(format!("{}/mcp", server.uri())),
                category: Some("tools".to_string()),
            }
        }

        fn never() -> impl Future<Output = io::Result<()>> {
            std::future::pending()
        }

        fn printed(out: Vec<u8>) -> Value {
            serde_json::from_slice(&out).unwrap()
        }

        #[tokio::test]
        async fn success_prints_result_and_exits_zero() {
            let server = MockServer::start().await;

            Mock::given(method("POST"))
                .and(body_partial_json(json!({
                    "method": "tools/call",
                    "params": {"name": "echo"},
                })))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "result": {"content": [{"type": "text", "text": "hello"}]},
                })))
                .expect(1)
                .mount(&server)
                .await;

            let mut out = Vec::new();
            let code = run(args_for(&server, "echo"), never(), &mut out)
                .await
                .unwrap();

            assert_eq!(code, 0);
            let text = String::from_utf8(out.clone()).unwrap();
            assert!(text.contains("\n  \"content\""), "not pretty printed: {text}");
            assert_eq!(
                printed(out),
                json!({"content": [{"type": "text", "text": "hello"}], "isError": false})
            );
        }

        #[tokio::test]
        async fn rpc_error_prints_error_result_and_exits_one() {
            let server = MockServer::start().await;

            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "error": {"code": -32602, "message": "Unknown tool: nope"},
                })))
                .mount(&server)
                .await;

            let mut out = Vec::new();
            let code = run(args_for(&server, "nope"), never(), &mut out)
                .await
                .unwrap();

            assert_eq!(code, 1);
            assert_eq!(
                printed(out),
                json!({
                    "content": [{"type": "text", "text": "Unknown tool: nope"}],
                    "isError": true,
                })
            );
        }

        #[tokio::test]
        async fn interrupt_cancels_and_notifies_server() {
            let server = MockServer::start().await;

            Mock::given(method("POST"))
                .and(body_partial_json(json!({"method": "tools/call"})))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": {"content": []}}))
                        .set_delay(Duration::from_secs(5)),
                )
                .expect(1)
                .mount(&server)
                .await;

            Mock::given(method("POST"))
                .and(body_partial_json(json!({
                    "method": "notifications/cancelled",
                    "params": {"requestId": 1},
                })))
                .respond_with(ResponseTemplate::new(202).set_delay(Duration::from_millis(200)))
                .expect(1)
                .mount(&server)
                .await;

            let interrupt = async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok::<(), io::Error>(())
            };

            let mut out = Vec::new();
            let code = run(args_for(&server, "slow"), interrupt, &mut out)
                .await
                .unwrap();

            assert_eq!(code, 0);
            assert_eq!(
                printed(out),
                json!({"content": [{"type": "text", "text": CANCELLED_MESSAGE}], "isError": false})
            );

            // run() has returned, so the notification must already be delivered
            let notified = server
                .received_requests()
                .await
                .unwrap()
                .iter()
                .filter(|r| {
                    serde_json::from_slice::<Value>(&r.body).unwrap()["method"]
                        == "notifications/cancelled"
                })
                .count();
            assert_eq!(notified, 1);
        }

        #[tokio::test]
        async fn failed_interrupt_handler_is_an_error() {
            let server = MockServer::start().await;

            Mock::given(method("POST"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": {"content": []}}))
                        .set_delay(Duration::from_secs(5)),
                )
                .mount(&server)
                .await;

            let interrupt = async { Err::<(), _>(io::Error::other("no signal handler")) };

            let mut out = Vec::new();
            let err = run(args_for(&server, "slow"), interrupt, &mut out)
                .await
                .unwrap_err();
            assert!(format!("{err:#}").contains("failed to install Ctrl+C handler"));
        }
    }
}
