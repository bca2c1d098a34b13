//! Demo handler set served by the relay binary
//!
//! - `PING`: broadcast `PONG` to every connection
//! - `ECHO`: send the action back to its sender
//! - `WHISPER`: forward the action to the connection named in its `to` field
//!
//! Every action is also logged by the audit handler, whatever its type.

use socket_relay::transport::ServerTransport;
use socket_relay::{Action, CombinedHandlers, Context, RelayError, RelayResult, TypeRouter};

pub const PING: &str = "PING";
pub const PONG: &str = "PONG";
pub const ECHO: &str = "ECHO";
pub const WHISPER: &str = "WHISPER";

/// Audit handler followed by the action router
pub fn demo_handlers<T: ServerTransport + 'static>() -> CombinedHandlers<T> {
    CombinedHandlers::<T>::new()
        .with("audit", audit::<T>)
        .with(
            "actions",
            TypeRouter::<T>::new()
                .on(PING, ping::<T>)
                .on(ECHO, echo::<T>)
                .on(WHISPER, whisper::<T>),
        )
}

pub fn audit<T: ServerTransport>(ctx: &Context<T>, action: &Action) -> RelayResult<()> {
    tracing::info!(
        connection_id = %ctx.connection_id(),
        action_type = %action.action_type,
        dispatched_by = ?action.dispatched_by(),
        "Relayed action received"
    );
    Ok(())
}

pub fn ping<T: ServerTransport>(ctx: &Context<T>, _action: &Action) -> RelayResult<()> {
    let delivered = ctx.dispatch_all(Action::new(PONG))?;
    tracing::debug!(connection_id = %ctx.connection_id(), delivered, "PONG broadcast");
    Ok(())
}

pub fn echo<T: ServerTransport>(ctx: &Context<T>, action: &Action) -> RelayResult<()> {
    ctx.dispatch(action.clone())
}

pub fn whisper<T: ServerTransport>(ctx: &Context<T>, action: &Action) -> RelayResult<()> {
    let to = action
        .get("to")
        .and_then(|value| value.as_str())
        .ok_or_else(|| RelayError::handler("WHISPER requires a string `to` field"))?;

    ctx.dispatch_to(
        to,
        action.clone().with_payload("from", ctx.connection_id()),
    )
}
