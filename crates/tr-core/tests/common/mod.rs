//! Protocol plugins shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use tr_codec::{flat_command_line, flat_csv, FieldMap};
use tr_common::{Mode, SessionId};
use tr_core::{Context, Engine, Protocol, HTTP, REDIS};

/// Command-line requests, CSV responses, labelled by the first four chars.
pub struct RedisProtocol;

impl Protocol for RedisProtocol {
    fn should_diff(&self) -> bool {
        true
    }

    fn label(&self, request: &str) -> String {
        request.chars().take(4).collect()
    }

    fn flat_request(&self, request: &str) -> tr_codec::Result<FieldMap> {
        flat_command_line(request)
    }

    fn flat_response(&self, response: &str) -> tr_codec::Result<FieldMap> {
        flat_csv(response)
    }
}

/// Opaque payloads. Flattening yields no fields, so diffs only show protocol and timestamp.
pub struct HttpProtocol;

impl Protocol for HttpProtocol {
    fn should_diff(&self) -> bool {
        true
    }

    fn label(&self, request: &str) -> String {
        request.chars().take(4).collect()
    }

    fn flat_request(&self, _request: &str) -> tr_codec::Result<FieldMap> {
        Ok(FieldMap::new())
    }

    fn flat_response(&self, _response: &str) -> tr_codec::Result<FieldMap> {
        Ok(FieldMap::new())
    }
}

pub fn engine(mode: Mode) -> Engine {
    let engine = Engine::new();
    engine.register(HTTP, Arc::new(HttpProtocol));
    engine.register(REDIS, Arc::new(RedisProtocol));
    engine.set_mode(mode);
    engine
}

pub fn bound(id: &SessionId) -> Context {
    let (ctx, _) = Context::background().with_store();
    ctx.bind_session_id(id).expect("fresh store accepts a session id");
    ctx
}
