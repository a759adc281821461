//! Lifecycle events emitted while a request moves through the pipeline.
//!
//! Observers subscribe by putting a [`LogFunction`] on the request; no sink
//! means no emission. The dotted [`name`](LifecycleEvent::name)s are stable
//! and adapters may log, meter, or fan them out however they like.

use std::fmt;
use std::sync::Arc;

use crate::json_ext::Object;

/// One step in the life of a request.
///
/// Payload-carrying variants borrow from the request so emission never
/// allocates.
#[derive(Clone, Copy, Debug)]
pub enum LifecycleEvent<'a> {
    RequestStart,
    /// The submitted query, always as text. A pre-parsed document is rendered
    /// back to canonical text before this fires.
    RequestQuery(&'a str),
    RequestVariables(&'a Object),
    RequestOperationName(Option<&'a str>),
    ParseStart,
    ParseEnd,
    ValidationStart,
    ValidationEnd,
    ExecutionStart,
    ExecutionEnd,
    RequestEnd,
}

impl LifecycleEvent<'_> {
    /// The dotted wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::RequestStart => "request.start",
            LifecycleEvent::RequestQuery(_) => "request.query",
            LifecycleEvent::RequestVariables(_) => "request.variables",
            LifecycleEvent::RequestOperationName(_) => "request.operationName",
            LifecycleEvent::ParseStart => "parse.start",
            LifecycleEvent::ParseEnd => "parse.end",
            LifecycleEvent::ValidationStart => "validation.start",
            LifecycleEvent::ValidationEnd => "validation.end",
            LifecycleEvent::ExecutionStart => "execution.start",
            LifecycleEvent::ExecutionEnd => "execution.end",
            LifecycleEvent::RequestEnd => "request.end",
        }
    }
}

impl fmt::Display for LifecycleEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An observer for [`LifecycleEvent`]s.
pub type LogFunction = Arc<dyn for<'a> Fn(LifecycleEvent<'a>) + Send + Sync>;

/// Send `event` to the sink, if there is one.
pub(crate) fn emit(sink: &Option<LogFunction>, event: LifecycleEvent<'_>) {
    if let Some(sink) = sink {
        (sink)(event);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn names_match_the_wire_protocol() {
        let variables = Object::new();
        let named: Vec<&str> = [
            LifecycleEvent::RequestStart,
            LifecycleEvent::RequestQuery("{ testString }"),
            LifecycleEvent::RequestVariables(&variables),
            LifecycleEvent::RequestOperationName(None),
            LifecycleEvent::ParseStart,
            LifecycleEvent::ParseEnd,
            LifecycleEvent::ValidationStart,
            LifecycleEvent::ValidationEnd,
            LifecycleEvent::ExecutionStart,
            LifecycleEvent::ExecutionEnd,
            LifecycleEvent::RequestEnd,
        ]
        .iter()
        .map(LifecycleEvent::name)
        .collect();
        assert_eq!(
            named,
            vec![
                "request.start",
                "request.query",
                "request.variables",
                "request.operationName",
                "parse.start",
                "parse.end",
                "validation.start",
                "validation.end",
                "execution.start",
                "execution.end",
                "request.end",
            ]
        );
    }

    #[test]
    fn emit_without_a_sink_is_a_no_op() {
        emit(&None, LifecycleEvent::RequestStart);
    }

    #[test]
    fn emit_reaches_the_sink() {
        let seen: Arc<Mutex<Vec<String>>> = Default::default();
        let sink_seen = Arc::clone(&seen);
        let sink: LogFunction = Arc::new(move |event| {
            sink_seen.lock().unwrap().push(event.to_string());
        });
        emit(&Some(sink), LifecycleEvent::RequestStart);
        assert_eq!(*seen.lock().unwrap(), vec!["request.start".to_string()]);
    }
}
