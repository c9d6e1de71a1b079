use crate::codec;
use crate::consumers::{Handler, HandlerResult, Requeue};
use crate::HandlerError;
use futures_util::future::{self, BoxFuture};
use futures_util::FutureExt;

/// Decode `content` and hand it to `handler`, together with `requeue`.
///
/// The handler is invoked before `process` returns. The returned future resolves once the
/// handler has completed: right away for [`HandlerResult::Immediate`], when the handler's own
/// future resolves for [`HandlerResult::Pending`].
pub fn process(
    content: &[u8],
    requeue: Requeue,
    handler: &dyn Handler,
) -> BoxFuture<'static, Result<(), HandlerError>> {
    let payload = codec::decode(content);
    match handler.handle(payload, requeue) {
        HandlerResult::Immediate(outcome) => future::ready(outcome).boxed(),
        HandlerResult::Pending(completion) => completion,
    }
}
