use color_eyre::eyre::Context as _;
use tracing_subscriber::{
    layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter, Layer as _, Registry,
};
use tracing_tree::HierarchicalLayer;

/// Sets up tracing with either JSON or hierarchical output.
///
/// Diagnostics go to stderr; stdout belongs to the migration progress lines.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Log filter (defaults to `info,{crate_name}=debug`)
/// - `JSON_LOGS`: If set, outputs JSON logs instead of hierarchical
pub fn setup_tracing(crate_name: &str) -> color_eyre::Result<()> {
    let rust_log =
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("info,{crate_name}=debug"));

    let env_filter = EnvFilter::builder().parse(&rust_log).wrap_err_with(|| {
        color_eyre::eyre::eyre!("Couldn't create env filter from {}", rust_log)
    })?;

    let output_layer = if std::env::var("JSON_LOGS").is_ok() {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .boxed()
    } else {
        HierarchicalLayer::default()
            .with_writer(std::io::stderr)
            .with_indent_lines(true)
            .with_indent_amount(2)
            .with_targets(true)
            .boxed()
    };

    Registry::default()
        .with(output_layer)
        .with(env_filter)
        .try_init()?;

    Ok(())
}
