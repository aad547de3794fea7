//! # Dispatcher
//!
//! Connects the transport to the registry: resolves the target method,
//! decodes arguments against its declared kinds, injects the caller
//! identity, runs the native operation (inline or through the job tracker),
//! and shapes the outcome for the wire.
//!
//! ## Invariants
//! - Unknown object or method is `NotFound`, never an error.
//! - A native failure is logged with its original message before it is
//!   translated into the wire error taxonomy.
//! - A `Void` result is an explicit zero-row success.

use std::sync::Arc;

use helmpack::Decoder;
use helmpack::Encoder;

use helmrpc::CodecError;
use helmrpc::ErrorCode;
use helmrpc::Frame;
use helmrpc::ReplyBody;
use helmrpc::ReplyEncoder;
use helmrpc::Row;
use helmrpc::WireValue;
use helmrpc::decode_seq;
use helmrpc::decode_value;

use crate::ipc::RequestHandler;
use crate::jobs::JobTracker;
use crate::registry::CallContext;
use crate::registry::ExecMode;
use crate::registry::InvokeError;
use crate::registry::MethodDescriptor;
use crate::registry::NativeOutput;
use crate::registry::Registry;
use crate::registry::ResolvedResult;

/// The result of dispatching one call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Rows(Vec<Row>),
    NotFound,
    Error { code: ErrorCode, message: String },
}

impl Outcome {
    fn server_error(message: impl Into<String>) -> Self {
        Outcome::Error { code: ErrorCode::ServerError, message: message.into() }
    }
}

/// Routes calls from the transport into registered native operations.
pub struct Dispatcher {
    registry: Arc<Registry>,
    jobs: Arc<JobTracker>,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, jobs: Arc<JobTracker>) -> Self {
        Self { registry, jobs }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn jobs(&self) -> &Arc<JobTracker> {
        &self.jobs
    }

    /// Dispatches one call. `args` must point at the List container holding
    /// the wire arguments in declaration order.
    pub fn dispatch(
        &self,
        object: &str,
        method: &str,
        args: Decoder<'_>,
        caller: Option<&str>,
    ) -> Outcome {
        let Some(descriptor) = self.registry.resolve_method(object, method) else {
            tracing::debug!(object, method, "call target not registered");
            return Outcome::NotFound;
        };

        let ctx = match self.decode_args(&descriptor, args, caller) {
            Ok(ctx) => ctx,
            Err(outcome) => return outcome,
        };

        match &descriptor.mode {
            ExecMode::Inline => self.run_inline(&descriptor, ctx),
            ExecMode::Job(tag) => self.run_job(&descriptor, tag, ctx),
        }
    }

    fn decode_args(
        &self,
        descriptor: &MethodDescriptor,
        mut args: Decoder<'_>,
        caller: Option<&str>,
    ) -> Result<CallContext, Outcome> {
        let mut wire = match args.list() {
            Ok(iter) => iter,
            Err(e) => {
                tracing::error!(
                    object = %descriptor.object,
                    method = %descriptor.name,
                    error = %e,
                    "malformed argument container",
                );
                return Err(Outcome::server_error(format!("malformed arguments: {}", e)));
            }
        };

        let mut values = Vec::with_capacity(descriptor.params.len());
        for param in &descriptor.params {
            if param.caller_identity {
                // Filled from the transport, never wire-decoded.
                values.push(match caller {
                    Some(token) => WireValue::Text(token.to_string()),
                    None => WireValue::Null,
                });
                continue;
            }

            let Some(mut item) = wire.next() else {
                return Err(self.arity_error(descriptor));
            };
            match decode_value(&mut item, &param.kind) {
                Ok(value) => values.push(value),
                Err(e) => {
                    tracing::error!(
                        object = %descriptor.object,
                        method = %descriptor.name,
                        param = %param.name,
                        error = %e,
                        "argument decode failed",
                    );
                    return Err(self.codec_error(descriptor, &param.name, e));
                }
            }
        }

        if wire.next().is_some() {
            return Err(self.arity_error(descriptor));
        }

        Ok(CallContext { args: values })
    }

    fn arity_error(&self, descriptor: &MethodDescriptor) -> Outcome {
        let message = format!(
            "{}.{} takes {} argument(s)",
            descriptor.object,
            descriptor.name,
            descriptor.wire_arity(),
        );
        tracing::error!(
            object = %descriptor.object,
            method = %descriptor.name,
            "{}", message,
        );
        Outcome::server_error(message)
    }

    fn codec_error(&self, descriptor: &MethodDescriptor, param: &str, e: CodecError) -> Outcome {
        Outcome::server_error(format!(
            "argument '{}' of {}.{}: {}",
            param, descriptor.object, descriptor.name, e,
        ))
    }

    fn run_inline(&self, descriptor: &MethodDescriptor, ctx: CallContext) -> Outcome {
        match (descriptor.native)(ctx) {
            Ok(output) => shape_output(descriptor, output),
            Err(e) => self.invoke_error(descriptor, e),
        }
    }

    fn run_job(&self, descriptor: &MethodDescriptor, tag: &str, ctx: CallContext) -> Outcome {
        let native = descriptor.native.clone();
        let (id, _handle) = self.jobs.submit(tag.to_string(), move || {
            native(ctx).map(|_| ()).map_err(|e| e.to_string())
        });

        tracing::debug!(
            object = %descriptor.object,
            method = %descriptor.name,
            job = %id,
            "call routed to job subsystem",
        );

        Outcome::Rows(vec![vec![("result".to_string(), WireValue::Text(id.to_string()))]])
    }

    fn invoke_error(&self, descriptor: &MethodDescriptor, e: InvokeError) -> Outcome {
        tracing::error!(
            object = %descriptor.object,
            method = %descriptor.name,
            error = %e,
            "native operation failed",
        );
        match e {
            InvokeError::Unauthorized(message) => {
                Outcome::Error { code: ErrorCode::Unauthorized, message }
            }
            InvokeError::Failed(message) => {
                Outcome::Error { code: ErrorCode::ServerError, message }
            }
        }
    }
}

fn shape_output(descriptor: &MethodDescriptor, output: NativeOutput) -> Outcome {
    match (&descriptor.result, output) {
        (ResolvedResult::Void, NativeOutput::Void) => Outcome::Rows(vec![]),
        (ResolvedResult::Single(_), NativeOutput::Single(value)) => {
            Outcome::Rows(vec![vec![("result".to_string(), value)]])
        }
        (ResolvedResult::Rows(_), NativeOutput::Rows(rows)) => Outcome::Rows(rows),
        (_, output) => {
            tracing::error!(
                object = %descriptor.object,
                method = %descriptor.name,
                ?output,
                "native output does not match the declared result shape",
            );
            Outcome::server_error(format!(
                "{}.{} produced a result of the wrong shape",
                descriptor.object, descriptor.name,
            ))
        }
    }
}

#[async_trait::async_trait]
impl RequestHandler for Dispatcher {
    /// Decodes a Call frame, dispatches it, and encodes the Reply frame.
    ///
    /// A frame that cannot be decoded still gets a best-effort error reply;
    /// if even the sequence number is unreadable, the reply carries seq 0.
    async fn handle(&self, payload: &[u8]) -> Vec<u8> {
        let mut dec = Decoder::new(payload);
        let outcome_and_seq = match Frame::decode(&mut dec) {
            Ok(Frame::Call(call)) => {
                let outcome = self.dispatch(call.object, call.method, call.args, call.caller);
                (call.seq, outcome)
            }
            Ok(Frame::Reply(reply)) => {
                tracing::warn!(seq = reply.seq, "server received a reply frame");
                (reply.seq, Outcome::server_error("expected a call frame"))
            }
            Err(e) => {
                tracing::error!(error = %e, "malformed call frame");
                let seq = decode_seq(payload).unwrap_or(0);
                (seq, Outcome::server_error(format!("malformed frame: {}", e)))
            }
        };

        let (seq, outcome) = outcome_and_seq;
        encode_reply(seq, &outcome)
    }
}

fn encode_reply(seq: u64, outcome: &Outcome) -> Vec<u8> {
    let mut enc = Encoder::new();
    let body = match outcome {
        Outcome::Rows(rows) => ReplyBody::Rows(rows),
        Outcome::NotFound => ReplyBody::NotFound,
        Outcome::Error { code, message } => ReplyBody::Error { code: *code, message },
    };

    let encoded = ReplyEncoder::new(seq, body)
        .encode(&mut enc)
        .and_then(|_| enc.into_bytes().map_err(Into::into));

    match encoded {
        Ok(bytes) => bytes,
        Err(e) => {
            // Encoding a reply from owned data only fails on a frame bug;
            // fall back to a minimal error reply.
            tracing::error!(error = %e, "reply encoding failed");
            let mut enc = Encoder::new();
            let fallback = ReplyEncoder::new(seq, ReplyBody::Error {
                code: helmrpc::ErrorCode::ServerError,
                message: "internal reply encoding failure",
            });
            fallback
                .encode(&mut enc)
                .ok()
                .and_then(|_| enc.into_bytes().ok())
                .unwrap_or_default()
        }
    }
}
