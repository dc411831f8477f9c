//! JSON records exchanged with clients, one request and one response per
//! connection.

use std::collections::BTreeMap;

use crate::content::Content;
use crate::store::Address;
use crate::store::Assignment;

#[derive(Debug, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Request {
    Enable {
        enable: EnableRequest,
    },

    Query {
        query: QueryKind,
    },

    /// A null `message` blanks the display.
    Assign {
        address: Address,
        message: Option<Content>,

        #[serde(default)]
        priority: i64,

        /// Defaults to the peer address.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum EnableRequest {
    Set(bool),
    Toggle(Toggle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Toggle {
    Toggle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    /// What each display shows right now.
    Current,

    /// What is assigned to each display.
    Buffer,

    Enabled,
}

#[derive(Debug, serde::Serialize)]
#[serde(untagged)]
pub enum Response {
    Status { success: bool },
    Current(BTreeMap<Address, Option<String>>),
    Buffer(BTreeMap<Address, Option<Assignment>>),
    Enabled(bool),
}

impl Response {
    pub fn success(success: bool) -> Self {
        Response::Status { success }
    }

    pub fn failure() -> Self {
        Response::Status { success: false }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::EnableRequest;
    use super::QueryKind;
    use super::Request;
    use super::Response;
    use super::Toggle;

    #[test]
    fn test_enable() {
        let r = Request::Enable {
            enable: EnableRequest::Set(false),
        };
        insta::assert_json_snapshot!(r, @r#"
        {
          "enable": false
        }
        "#);
    }

    #[test]
    fn test_toggle() {
        let r = Request::Enable {
            enable: EnableRequest::Toggle(Toggle::Toggle),
        };
        insta::assert_json_snapshot!(r, @r#"
        {
          "enable": "toggle"
        }
        "#);
    }

    #[test]
    fn test_query() {
        let r = Request::Query {
            query: QueryKind::Buffer,
        };
        insta::assert_json_snapshot!(r, @r#"
        {
          "query": "buffer"
        }
        "#);
    }

    #[test]
    fn test_deser_enable_variants() {
        let r: Request = serde_json::from_str(r#"{"enable": true}"#).unwrap();
        assert!(matches!(
            r,
            Request::Enable {
                enable: EnableRequest::Set(true)
            }
        ));

        let r: Request = serde_json::from_str(r#"{"enable": "toggle"}"#).unwrap();
        assert!(matches!(
            r,
            Request::Enable {
                enable: EnableRequest::Toggle(Toggle::Toggle)
            }
        ));

        assert!(serde_json::from_str::<Request>(r#"{"enable": "maybe"}"#).is_err());
    }

    #[test]
    fn test_deser_queries() {
        for (s, kind) in [
            ("current", QueryKind::Current),
            ("buffer", QueryKind::Buffer),
            ("enabled", QueryKind::Enabled),
        ] {
            let r: Request = serde_json::from_str(&format!(r#"{{"query": "{s}"}}"#)).unwrap();
            assert!(matches!(r, Request::Query { query } if query == kind));
        }
    }

    #[test]
    fn test_deser_assign_defaults() {
        let r: Request =
            serde_json::from_str(r#"{"address": 2, "message": {"type": "text", "text": "Hi"}}"#)
                .unwrap();
        let Request::Assign {
            address,
            message,
            priority,
            client,
        } = r
        else {
            panic!("Expected assign request, got {r:?}")
        };
        assert_eq!(address, 2);
        assert!(message.is_some());
        assert_eq!(priority, 0);
        assert_eq!(client, None);
    }

    #[test]
    fn test_deser_assign_null_message_blanks() {
        let r: Request =
            serde_json::from_str(r#"{"address": 1, "message": null, "priority": 3, "client": "me"}"#)
                .unwrap();
        assert!(matches!(
            r,
            Request::Assign { address: 1, message: None, priority: 3, client: Some(ref c) } if c == "me"
        ));
    }

    #[test]
    fn test_deser_malformed() {
        for s in [
            r#"{}"#,
            r#"{"address": "zero", "message": null}"#,
            r#"{"address": 0, "message": {"type": "marquee"}}"#,
            r#"{"query": "everything"}"#,
            r#"[1, 2, 3]"#,
        ] {
            assert!(serde_json::from_str::<Request>(s).is_err(), "{s} parsed");
        }
    }

    #[test]
    fn test_response_shapes() {
        let status = serde_json::to_value(Response::success(true)).unwrap();
        assert_eq!(status, serde_json::json!({"success": true}));

        let current = Response::Current(BTreeMap::from([
            (0, Some("Hello".to_string())),
            (1, None),
        ]));
        assert_eq!(
            serde_json::to_value(current).unwrap(),
            serde_json::json!({"0": "Hello", "1": null})
        );

        let enabled = serde_json::to_value(Response::Enabled(false)).unwrap();
        assert_eq!(enabled, serde_json::json!(false));
    }
}
