use domcast_core::{Arg, JsFunction};
use domcast_web::{AxumDomcastAdapter, HandlerTable};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut table = HandlerTable::new();
    table.register("toggle_menu", |args, _shared, ctx| {
        let open = args["open"].as_bool().unwrap_or(false);
        let mut r = ctx.response_at("#menu");
        r.unless(open, false)
            .generic_command("slideDown", vec![Arg::Int(200)])
            .incase(open, false)
            .generic_command("slideUp", vec![Arg::Int(200)]);
        r
    })?;
    table.register("greet", |args, shared, ctx| {
        let who = args["name"].as_str().unwrap_or("stranger").to_string();
        let mut banner = ctx.response_at("#banner");
        banner.generic_command("text", vec![Arg::from(format!("hello {who}"))]);

        let mut page = ctx.response();
        page.set_var("visits", shared["visits"].as_i64().unwrap_or(0))
            .call(
                "setTimeout",
                vec![
                    JsFunction::raw("function () { console.log($who); }")
                        .bind("who", who)
                        .into(),
                    Arg::Int(500),
                ],
            )
            .merge(&banner);
        page
    })?;
    table.register("status", |_args, _shared, _ctx| json!({"ok": true}))?;

    let router = AxumDomcastAdapter::new(table).router();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
    tracing::info!(addr = "127.0.0.1:3000", "domcast demo listening");
    axum::serve(listener, router).await?;
    Ok(())
}
