use serde::{Deserialize, Serialize};

use super::{key::QueryKey, state::QueryState};

/// Element id of the script tag carrying the snapshot in rendered pages.
pub const STATE_ELEMENT_ID: &str = "__QUERY_STATE__";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DehydratedQuery {
    pub query_key: QueryKey,
    pub query_hash: String,
    pub state: QueryState,
}

/// Transfer format between the rendering server and the consuming client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DehydratedState {
    pub queries: Vec<DehydratedQuery>,
}

impl DehydratedState {
    /// JSON safe to embed inside a `<script>` element.
    pub fn to_script_json(&self) -> serde_json::Result<String> {
        Ok(serde_json::to_string(self)?
            .replace('<', "\\u003c")
            .replace('>', "\\u003e")
            .replace('&', "\\u0026"))
    }

    /// Finds and parses the snapshot embedded in a rendered page.
    pub fn extract_from_html(html: &str) -> Option<Self> {
        let marker = format!(r#"id="{STATE_ELEMENT_ID}">"#);
        let start = html.find(&marker)? + marker.len();
        let len = html[start..].find("</script>")?;
        serde_json::from_str(&html[start..start + len]).ok()
    }
}
