//! Reconstructs a shell command reproducing the last request

use url::form_urlencoded;

use crate::http::exchange::HttpExchange;

/// `curl -X <METHOD>[ --data '<form>'][ -H '<name>: <value>']… '<uri>'`
///
/// `HTTPS` and `HTTP_*` server parameters are left out.
pub fn curl_command<E: HttpExchange + ?Sized>(exchange: &E) -> String {
    let mut command = format!("curl -X {}", exchange.method());

    let parameters = exchange.parameters();
    if !parameters.is_empty() {
        let data = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(parameters)
            .finish();
        command.push_str(&format!(" --data '{data}'"));
    }

    for (name, value) in exchange.server_parameters() {
        if name != "HTTPS" && !name.starts_with("HTTP_") {
            command.push_str(&format!(" -H '{name}: {value}'"));
        }
    }

    command.push_str(&format!(" '{}'", exchange.uri()));
    command
}
