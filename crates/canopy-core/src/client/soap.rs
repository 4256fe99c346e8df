//! SOAP transport for the Metadata API deploy calls.
//!
//! The envelope shape is fixed by the service, so it is written out
//! directly; responses are only mined for the handful of elements the
//! facades inspect (request id, fault code and message).

use std::fmt::Write as _;

use super::types::DeployRequestOptions;

const METADATA_NS: &str = "http://soap.platform.com/2006/04/metadata";

/// Envelope for a `deploy` call carrying a base64 archive.
pub fn deploy_envelope(
    session_id: &str,
    zip_base64: &str,
    options: &DeployRequestOptions,
) -> String {
    wrap(
        session_id,
        &format!(
            "<met:deploy><met:ZipFile>{}</met:ZipFile>{}</met:deploy>",
            zip_base64,
            deploy_options_xml(options)
        ),
    )
}

/// Envelope for a `deployRecentValidation` call.
pub fn deploy_recent_validation_envelope(session_id: &str, validated_id: &str) -> String {
    wrap(
        session_id,
        &format!(
            "<met:deployRecentValidation><met:validationId>{}</met:validationId></met:deployRecentValidation>",
            escape_text(validated_id)
        ),
    )
}

fn wrap(session_id: &str, body: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns:met="{ns}">"#,
            "<soapenv:Header><met:SessionHeader><met:sessionId>{session}</met:sessionId></met:SessionHeader></soapenv:Header>",
            "<soapenv:Body>{body}</soapenv:Body>",
            "</soapenv:Envelope>"
        ),
        ns = METADATA_NS,
        session = escape_text(session_id),
        body = body
    )
}

fn deploy_options_xml(options: &DeployRequestOptions) -> String {
    let mut xml = String::from("<met:DeployOptions>");
    let mut element = |name: &str, value: &str| {
        let _ = write!(xml, "<met:{name}>{value}</met:{name}>");
    };

    element(
        "rollbackOnError",
        bool_text(options.rollback_on_error),
    );
    element("autoUpdatePackage", bool_text(options.auto_update_package));
    element("ignoreWarnings", bool_text(options.ignore_warnings));
    element("checkOnly", bool_text(options.check_only));
    element("singlePackage", bool_text(options.single_package));
    element("purgeOnDelete", bool_text(options.purge_on_delete));
    if let Some(test_level) = &options.test_level {
        element("testLevel", &escape_text(test_level));
    }
    for test in &options.run_tests {
        element("runTests", &escape_text(test));
    }
    xml.push_str("</met:DeployOptions>");
    xml
}

fn bool_text(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Extract the text of the first `<tag>...</tag>` element.
///
/// The responses this is used on are flat, machine-generated documents;
/// nothing here aspires to be a general XML parser.
pub fn extract_tag<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)? + start;
    Some(&xml[start..end])
}
