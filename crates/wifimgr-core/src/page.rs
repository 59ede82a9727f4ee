//! HTML pages served by the configuration portal.
//!
//! Both the Axum portal and the ESP-IDF portal render the same pages, so the
//! templates live here. The form template carries `%NAME%` placeholders that
//! [`render_form`] fills with HTML-escaped values.

use crate::portal::PortalView;

/// Configuration form with `%NAME%` placeholders.
pub const FORM_TEMPLATE: &str = include_str!("../templates/form.html");

/// Page returned after a successful submission.
pub const SAVED_PAGE: &str = include_str!("../templates/saved.html");

/// Fill the form template with the current values.
///
/// The template is scanned once, so placeholder text inside a stored value is
/// emitted as is and never expanded.
pub fn render_form(view: &PortalView) -> String {
    let mut html = String::with_capacity(FORM_TEMPLATE.len() + 256);
    let mut rest = FORM_TEMPLATE;

    while let Some(start) = rest.find('%') {
        html.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let value = after
            .find('%')
            .and_then(|end| placeholder(view, &after[..end]).map(|value| (end, value)));
        match value {
            Some((end, value)) => {
                html.push_str(&escape_html(value));
                rest = &after[end + 1..];
            }
            None => {
                // a literal percent sign, e.g. in the stylesheet
                html.push('%');
                rest = after;
            }
        }
    }
    html.push_str(rest);
    html
}

fn placeholder<'a>(view: &'a PortalView, name: &str) -> Option<&'a str> {
    let checked = |on: bool| if on { "checked" } else { "" };
    let value = match name {
        "SSID" => view.ssid.as_str(),
        "PASSWORD" => view.password.as_str(),
        "MQTT_CHECKED" => checked(view.mqtt_enabled),
        "MQTT_SERVER" => view.mqtt_server.as_str(),
        "MQTT_PORT" => view.mqtt_port.as_str(),
        "MQTT_USERNAME" => view.mqtt_username.as_str(),
        "MQTT_PASSWORD" => view.mqtt_password.as_str(),
        "MQTT_CLIENT_ID" => view.mqtt_client_id.as_str(),
        "UDP_CHECKED" => checked(view.udp_enabled),
        "UDP_PORT" => view.udp_port.as_str(),
        "DEVICE_NAME" => view.device_name.as_str(),
        _ => return None,
    };
    Some(value)
}

/// Escape text for use inside an HTML attribute value.
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
