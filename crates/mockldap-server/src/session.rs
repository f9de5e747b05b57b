//! Per-connection protocol handling.
//!
//! An [`LdapSession`] turns decoded requests into directory calls and encodes the outcome as
//! response messages. The only state it carries is the identity established by the last
//! successful bind.

use std::borrow::Cow;

use ldap3_proto::proto::{
    LdapBindCred, LdapBindResponse, LdapExtendedResponse, LdapModify, LdapModifyType, LdapMsg,
    LdapOp, LdapPartialAttribute, LdapResult, LdapResultCode, LdapSearchRequest,
    LdapSearchResultEntry, LdapSearchScope,
};
use mockldap_core::{AttributeMap, DistinguishedName, Error};
use tracing::{debug, instrument, warn};

use crate::directory::Directory;
use crate::handlers::{Change, ChangeKind, SearchParams, SearchScope};

/// OID of the "Who am I?" extended operation (RFC 4532).
pub const WHOAMI_OID: &str = "1.3.6.1.4.1.4203.1.11.3";

/// What the connection loop should do after a request.
#[derive(Debug)]
pub enum LdapResponseState {
    /// The client unbound; close without replying.
    Unbind,
    /// Send these messages in order.
    Respond(Vec<LdapMsg>),
    /// Nothing to send.
    NoResponse,
    /// The request made no sense for a server; close the connection.
    Disconnect,
}

/// State of one client connection.
#[derive(Debug, Default)]
pub struct LdapSession {
    bound: Option<DistinguishedName>,
}

impl LdapSession {
    /// A fresh, anonymous session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity established by the last successful bind.
    #[must_use]
    pub fn bound(&self) -> Option<&DistinguishedName> {
        self.bound.as_ref()
    }

    /// Handles one request.
    #[instrument(name = "ldap-request", skip_all, fields(msgid = msg.msgid))]
    pub async fn process(&mut self, directory: &Directory, msg: LdapMsg) -> LdapResponseState {
        let msgid = msg.msgid;
        let caller = self.bound.clone();
        let caller = caller.as_ref();

        let op = match msg.op {
            LdapOp::BindRequest(req) => {
                let res = match req.cred {
                    LdapBindCred::Simple(password) => {
                        match directory.bind(&req.dn, &password).await {
                            Ok(identity) => {
                                self.bound = identity;
                                success()
                            }
                            Err(err) => error_result(&err),
                        }
                    }
                    _ => error_result(&Error::AuthMethodNotSupported(
                        "only simple bind is supported".to_string(),
                    )),
                };
                LdapOp::BindResponse(LdapBindResponse {
                    res,
                    saslcreds: None,
                })
            }
            LdapOp::UnbindRequest => {
                debug!("client unbound");
                return LdapResponseState::Unbind;
            }
            LdapOp::SearchRequest(req) => {
                return LdapResponseState::Respond(search(directory, caller, msgid, req).await);
            }
            LdapOp::AddRequest(req) => {
                let attributes: AttributeMap = req
                    .attributes
                    .into_iter()
                    .map(|attr| {
                        let values: Vec<String> =
                            attr.vals.iter().map(|v| lossy(v).into_owned()).collect();
                        (attr.atype, values)
                    })
                    .collect();
                LdapOp::AddResponse(outcome(directory.add(caller, &req.dn, attributes).await))
            }
            LdapOp::DelRequest(dn) => {
                LdapOp::DelResponse(outcome(directory.delete(caller, &dn).await))
            }
            LdapOp::ModifyRequest(req) => {
                let res = match changes(req.changes) {
                    Ok(changes) => outcome(directory.modify(caller, &req.dn, &changes).await),
                    Err(err) => error_result(&err),
                };
                LdapOp::ModifyResponse(res)
            }
            LdapOp::CompareRequest(req) => {
                let value = lossy(req.val.as_ref());
                let res = match directory.compare(caller, &req.dn, &req.atype, &value).await {
                    Ok(true) => ldap_result(LdapResultCode::CompareTrue, String::new()),
                    Ok(false) => ldap_result(LdapResultCode::CompareFalse, String::new()),
                    Err(err) => error_result(&err),
                };
                LdapOp::CompareResult(res)
            }
            LdapOp::ModifyDNRequest(_) => LdapOp::ModifyDNResponse(error_result(
                &Error::UnwillingToPerform("modify DN is not supported".to_string()),
            )),
            LdapOp::ExtendedRequest(req) if req.name == WHOAMI_OID => {
                let authz = caller.map_or_else(String::new, |dn| format!("dn:{dn}"));
                LdapOp::ExtendedResponse(LdapExtendedResponse {
                    res: success(),
                    name: None,
                    value: Some(authz.into_bytes()),
                })
            }
            LdapOp::ExtendedRequest(req) => LdapOp::ExtendedResponse(LdapExtendedResponse {
                res: error_result(&Error::UnwillingToPerform(format!(
                    "extended operation {} is not supported",
                    req.name
                ))),
                name: None,
                value: None,
            }),
            LdapOp::AbandonRequest(_) => return LdapResponseState::NoResponse,
            other => {
                warn!(?other, "unexpected operation from client");
                return LdapResponseState::Disconnect;
            }
        };

        LdapResponseState::Respond(vec![LdapMsg {
            msgid,
            op,
            ctrl: Vec::new(),
        }])
    }
}

async fn search(
    directory: &Directory,
    caller: Option<&DistinguishedName>,
    msgid: i32,
    req: LdapSearchRequest,
) -> Vec<LdapMsg> {
    let reply = |op| LdapMsg {
        msgid,
        op,
        ctrl: Vec::new(),
    };

    let types_only = req.typesonly;
    let params = search_params(req);
    match directory.search(caller, &params).await {
        Ok(found) => {
            let done = if found.size_limit_exceeded {
                error_result(&Error::SizeLimitExceeded(format!(
                    "more than {} entries matched",
                    params.size_limit
                )))
            } else {
                success()
            };
            found
                .entries
                .into_iter()
                .map(|entry| {
                    reply(LdapOp::SearchResultEntry(LdapSearchResultEntry {
                        dn: entry.dn.to_string(),
                        attributes: partial_attributes(&entry.attributes, types_only),
                    }))
                })
                .chain(std::iter::once(reply(LdapOp::SearchResultDone(done))))
                .collect()
        }
        Err(err) => vec![reply(LdapOp::SearchResultDone(error_result(&err)))],
    }
}

fn search_params(req: LdapSearchRequest) -> SearchParams {
    let scope = match req.scope {
        LdapSearchScope::Base => SearchScope::Base,
        LdapSearchScope::Subtree => SearchScope::Subtree,
        // Every entry sits directly under the suffix, so children == one level.
        _ => SearchScope::OneLevel,
    };
    SearchParams {
        base: req.base,
        scope,
        filter: req.filter,
        attributes: req.attrs,
        size_limit: usize::try_from(req.sizelimit).unwrap_or(0),
    }
}

fn partial_attributes(attributes: &AttributeMap, types_only: bool) -> Vec<LdapPartialAttribute> {
    attributes
        .iter()
        .map(|attr| LdapPartialAttribute {
            atype: attr.name.clone(),
            vals: if types_only {
                Vec::new()
            } else {
                attr.values.iter().map(|v| v.clone().into_bytes()).collect()
            },
        })
        .collect()
}

fn changes(raw: Vec<LdapModify>) -> Result<Vec<Change>, Error> {
    raw.into_iter()
        .map(|change| {
            let kind = match change.operation {
                LdapModifyType::Add => ChangeKind::Add,
                LdapModifyType::Delete => ChangeKind::Delete,
                LdapModifyType::Replace => ChangeKind::Replace,
                #[allow(unreachable_patterns)]
                _ => {
                    return Err(Error::ProtocolError(
                        "unsupported modification type".to_string(),
                    ))
                }
            };
            let values = change
                .modification
                .vals
                .iter()
                .map(|v| lossy(v).into_owned())
                .collect();
            Ok(Change::new(kind, change.modification.atype, values))
        })
        .collect()
}

fn lossy(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

fn ldap_result(code: LdapResultCode, message: String) -> LdapResult {
    LdapResult {
        code,
        matcheddn: String::new(),
        message,
        referral: Vec::new(),
    }
}

fn success() -> LdapResult {
    ldap_result(LdapResultCode::Success, String::new())
}

fn outcome(result: mockldap_core::Result<()>) -> LdapResult {
    match result {
        Ok(()) => success(),
        Err(err) => error_result(&err),
    }
}

fn error_result(err: &Error) -> LdapResult {
    debug!(error = %err, "request failed");
    ldap_result(result_code(err), err.to_string())
}

/// LDAP result code reported for `err`.
#[must_use]
pub fn result_code(err: &Error) -> LdapResultCode {
    LdapResultCode::try_from(i64::from(err.result_code())).unwrap_or(LdapResultCode::Other)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldap3_proto::proto::{
        LdapAddRequest, LdapAttribute, LdapBindRequest, LdapCompareRequest, LdapDerefAliases,
        LdapExtendedRequest, LdapFilter, LdapModifyDNRequest, LdapModifyRequest, SaslCredentials,
    };
    use mockldap_core::config::ServerConfig;

    fn directory() -> Directory {
        Directory::new(&ServerConfig::default()).unwrap()
    }

    fn msg(msgid: i32, op: LdapOp) -> LdapMsg {
        LdapMsg {
            msgid,
            op,
            ctrl: Vec::new(),
        }
    }

    fn bind_msg(dn: &str, password: &str) -> LdapMsg {
        msg(
            1,
            LdapOp::BindRequest(LdapBindRequest {
                dn: dn.to_string(),
                cred: LdapBindCred::Simple(password.to_string()),
            }),
        )
    }

    fn single(state: LdapResponseState) -> LdapMsg {
        match state {
            LdapResponseState::Respond(mut msgs) if msgs.len() == 1 => msgs.remove(0),
            other => panic!("expected one response, got {other:?}"),
        }
    }

    fn bind_code(state: LdapResponseState) -> LdapResultCode {
        match single(state).op {
            LdapOp::BindResponse(resp) => resp.res.code,
            other => panic!("unexpected {other:?}"),
        }
    }

    fn add_msg(dn: &str) -> LdapMsg {
        msg(
            2,
            LdapOp::AddRequest(LdapAddRequest {
                dn: dn.to_string(),
                attributes: vec![
                    LdapAttribute {
                        atype: "cn".to_string(),
                        vals: vec![b"Ben Hacker".to_vec()],
                    },
                    LdapAttribute {
                        atype: "userpassword".to_string(),
                        vals: vec![b"123".to_vec()],
                    },
                ],
            }),
        )
    }

    fn search_msg(base: &str) -> LdapMsg {
        msg(
            3,
            LdapOp::SearchRequest(LdapSearchRequest {
                base: base.to_string(),
                scope: LdapSearchScope::Subtree,
                aliases: LdapDerefAliases::Never,
                sizelimit: 0,
                timelimit: 0,
                typesonly: false,
                filter: LdapFilter::Present("objectclass".to_string()),
                attrs: Vec::new(),
            }),
        )
    }

    #[tokio::test]
    async fn bind_sets_and_keeps_identity() {
        let dir = directory();
        let mut session = LdapSession::new();

        let code = bind_code(session.process(&dir, bind_msg("cn=root", "secret")).await);
        assert!(matches!(code, LdapResultCode::Success));
        assert_eq!(session.bound().unwrap().as_str(), "cn=root");

        let code = bind_code(session.process(&dir, bind_msg("cn=root", "nope")).await);
        assert!(matches!(code, LdapResultCode::InvalidCredentials));
        assert_eq!(session.bound().unwrap().as_str(), "cn=root");

        let code = bind_code(session.process(&dir, bind_msg("", "")).await);
        assert!(matches!(code, LdapResultCode::Success));
        assert!(session.bound().is_none());
    }

    #[tokio::test]
    async fn add_requires_privileged_bind() {
        let dir = directory();
        let mut session = LdapSession::new();

        let reply = single(session.process(&dir, add_msg("cn=bhacker,o=testultrax")).await);
        assert_eq!(reply.msgid, 2);
        assert!(matches!(
            reply.op,
            LdapOp::AddResponse(LdapResult {
                code: LdapResultCode::InsufficentAccessRights,
                ..
            })
        ));

        session.process(&dir, bind_msg("cn=root", "secret")).await;
        let reply = single(session.process(&dir, add_msg("cn=bhacker,o=testultrax")).await);
        assert!(matches!(
            reply.op,
            LdapOp::AddResponse(LdapResult {
                code: LdapResultCode::Success,
                ..
            })
        ));
        assert_eq!(dir.entry_count().await, 1);
    }

    #[tokio::test]
    async fn search_streams_entries_then_done() {
        let dir = directory();
        let mut session = LdapSession::new();
        session.process(&dir, bind_msg("cn=root", "secret")).await;
        session.process(&dir, add_msg("cn=bhacker,o=testultrax")).await;

        let LdapResponseState::Respond(msgs) =
            LdapSession::new().process(&dir, search_msg("o=testultrax")).await
        else {
            panic!("expected responses");
        };
        // The filter asks for objectclass, which the added entry lacks.
        assert_eq!(msgs.len(), 1);
        assert!(matches!(
            msgs[0].op,
            LdapOp::SearchResultDone(LdapResult {
                code: LdapResultCode::Success,
                ..
            })
        ));

        let mut req = search_msg("o=testultrax");
        if let LdapOp::SearchRequest(search) = &mut req.op {
            search.filter = LdapFilter::Present("cn".to_string());
            search.typesonly = true;
        }
        let LdapResponseState::Respond(msgs) = LdapSession::new().process(&dir, req).await else {
            panic!("expected responses");
        };
        assert_eq!(msgs.len(), 2);
        match &msgs[0].op {
            LdapOp::SearchResultEntry(entry) => {
                assert_eq!(entry.dn, "cn=bhacker,o=testultrax");
                assert!(entry.attributes.iter().all(|attr| attr.vals.is_empty()));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn search_outside_suffix_reports_no_such_object() {
        let dir = directory();
        let reply = single(LdapSession::new().process(&dir, search_msg("o=elsewhere")).await);
        assert!(matches!(
            reply.op,
            LdapOp::SearchResultDone(LdapResult {
                code: LdapResultCode::NoSuchObject,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn modify_and_compare() {
        let dir = directory();
        let mut session = LdapSession::new();
        session.process(&dir, bind_msg("cn=root", "secret")).await;
        session.process(&dir, add_msg("cn=bhacker,o=testultrax")).await;

        let modify = msg(
            4,
            LdapOp::ModifyRequest(LdapModifyRequest {
                dn: "cn=bhacker,o=testultrax".to_string(),
                changes: vec![LdapModify {
                    operation: LdapModifyType::Add,
                    modification: LdapPartialAttribute {
                        atype: "title".to_string(),
                        vals: vec![b"Engineer".to_vec()],
                    },
                }],
            }),
        );
        let reply = single(session.process(&dir, modify).await);
        assert!(matches!(
            reply.op,
            LdapOp::ModifyResponse(LdapResult {
                code: LdapResultCode::Success,
                ..
            })
        ));

        let compare = |value: &str| {
            msg(
                5,
                LdapOp::CompareRequest(LdapCompareRequest {
                    dn: "cn=bhacker,o=testultrax".to_string(),
                    atype: "title".to_string(),
                    val: value.as_bytes().to_vec(),
                }),
            )
        };
        let reply = single(session.process(&dir, compare("Engineer")).await);
        assert!(matches!(
            reply.op,
            LdapOp::CompareResult(LdapResult {
                code: LdapResultCode::CompareTrue,
                ..
            })
        ));
        let reply = single(session.process(&dir, compare("Manager")).await);
        assert!(matches!(
            reply.op,
            LdapOp::CompareResult(LdapResult {
                code: LdapResultCode::CompareFalse,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn whoami_reports_bound_dn() {
        let dir = directory();
        let mut session = LdapSession::new();
        session.process(&dir, bind_msg("cn=root", "secret")).await;

        let request = msg(
            6,
            LdapOp::ExtendedRequest(LdapExtendedRequest {
                name: WHOAMI_OID.to_string(),
                value: None,
            }),
        );
        match single(session.process(&dir, request).await).op {
            LdapOp::ExtendedResponse(resp) => {
                assert_eq!(resp.value.as_deref(), Some(b"dn:cn=root".as_slice()));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn unbind_and_abandon_send_nothing() {
        let dir = directory();
        let mut session = LdapSession::new();
        assert!(matches!(
            session.process(&dir, msg(7, LdapOp::UnbindRequest)).await,
            LdapResponseState::Unbind
        ));
        assert!(matches!(
            session.process(&dir, msg(8, LdapOp::AbandonRequest(3))).await,
            LdapResponseState::NoResponse
        ));
    }

    #[tokio::test]
    async fn sasl_bind_is_not_supported() {
        let dir = directory();
        let mut session = LdapSession::new();
        session.process(&dir, bind_msg("cn=root", "secret")).await;

        let request = msg(
            9,
            LdapOp::BindRequest(LdapBindRequest {
                dn: String::new(),
                cred: LdapBindCred::SASL(SaslCredentials {
                    mechanism: "EXTERNAL".to_string(),
                    credentials: Vec::new(),
                }),
            }),
        );
        let code = bind_code(session.process(&dir, request).await);
        assert!(matches!(code, LdapResultCode::AuthMethodNotSupported));
        assert_eq!(session.bound().unwrap().as_str(), "cn=root");
    }

    #[tokio::test]
    async fn modify_dn_is_refused() {
        let dir = directory();
        let mut session = LdapSession::new();
        session.process(&dir, bind_msg("cn=root", "secret")).await;
        session.process(&dir, add_msg("cn=bhacker,o=testultrax")).await;

        let request = msg(
            10,
            LdapOp::ModifyDNRequest(LdapModifyDNRequest {
                dn: "cn=bhacker,o=testultrax".to_string(),
                newrdn: "cn=benh".to_string(),
                deleteoldrdn: true,
                new_superior: None,
            }),
        );
        let reply = single(session.process(&dir, request).await);
        assert_eq!(reply.msgid, 10);
        assert!(matches!(
            reply.op,
            LdapOp::ModifyDNResponse(LdapResult {
                code: LdapResultCode::UnwillingToPerform,
                ..
            })
        ));
        assert_eq!(dir.entry_count().await, 1);
    }

    #[tokio::test]
    async fn unknown_extended_operation_is_refused() {
        let dir = directory();
        let request = msg(
            11,
            LdapOp::ExtendedRequest(LdapExtendedRequest {
                // StartTLS
                name: "1.3.6.1.4.1.1466.20037".to_string(),
                value: None,
            }),
        );
        match single(LdapSession::new().process(&dir, request).await).op {
            LdapOp::ExtendedResponse(resp) => {
                assert!(matches!(resp.res.code, LdapResultCode::UnwillingToPerform));
                assert!(resp.value.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn response_from_client_disconnects() {
        let dir = directory();
        let mut session = LdapSession::new();
        let done = msg(12, LdapOp::SearchResultDone(success()));
        assert!(matches!(
            session.process(&dir, done).await,
            LdapResponseState::Disconnect
        ));

        let bound = msg(
            13,
            LdapOp::BindResponse(LdapBindResponse {
                res: success(),
                saslcreds: None,
            }),
        );
        assert!(matches!(
            session.process(&dir, bound).await,
            LdapResponseState::Disconnect
        ));
    }

    #[test]
    fn error_codes() {
        assert!(matches!(
            result_code(&Error::EntryAlreadyExists(String::new())),
            LdapResultCode::EntryAlreadyExists
        ));
        assert!(matches!(
            result_code(&Error::InsufficientAccessRights(String::new())),
            LdapResultCode::InsufficentAccessRights
        ));
        assert!(matches!(
            result_code(&Error::InvalidDnSyntax(String::new())),
            LdapResultCode::InvalidDNSyntax
        ));
        assert!(matches!(
            result_code(&Error::Timeout(String::new())),
            LdapResultCode::Other
        ));
    }
}
