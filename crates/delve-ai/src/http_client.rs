use std::time::Duration;

use reqwest::Client;

const DISABLE_SYSTEM_PROXY_ENV: &str = "DELVE_DISABLE_SYSTEM_PROXY";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
/// Upper bound for one request; find-all execution is the slowest call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Shared reqwest client for every Parallel endpoint.
pub(crate) fn build_http_client() -> Result<Client, reqwest::Error> {
    let builder = Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT);

    if system_proxy_disabled() {
        builder.no_proxy().build()
    } else {
        builder.build()
    }
}

fn system_proxy_disabled() -> bool {
    std::env::var_os(DISABLE_SYSTEM_PROXY_ENV).is_some() || cfg!(test)
}
