use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;
use tracing::{Id, Subscriber};
use tracing_subscriber::{Layer, layer::Context, registry::LookupSpan};

/// Field that ties a span to a chat session.
pub const SESSION_FIELD: &str = "session.id";

/// A finished span captured in memory.
#[derive(Debug, Clone, Serialize)]
pub struct SpanRecord {
    #[serde(rename = "span_id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "parent_span_id", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Nanoseconds since the Unix epoch.
    pub start_time: u128,
    pub end_time: u128,
    pub attributes: HashMap<String, serde_json::Value>,
}

impl SpanRecord {
    /// Wall-clock time between the span opening and closing, in milliseconds.
    pub fn duration_ms(&self) -> f64 {
        self.end_time.saturating_sub(self.start_time) as f64 / 1_000_000.0
    }
}

/// Captured spans, grouped by session id.
#[derive(Debug, Default)]
pub struct SpanStore {
    spans: RwLock<HashMap<String, Vec<SpanRecord>>>,
    capacity: Option<usize>,
}

impl SpanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `capacity` spans per session, dropping the oldest.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { spans: RwLock::default(), capacity: Some(capacity.max(1)) }
    }

    /// Spans recorded for `session_id`, in closing order.
    pub fn spans(&self, session_id: &str) -> Vec<SpanRecord> {
        self.spans.read().ok().and_then(|s| s.get(session_id).cloned()).unwrap_or_default()
    }

    pub fn clear(&self, session_id: &str) {
        if let Ok(mut spans) = self.spans.write() {
            spans.remove(session_id);
        }
    }

    fn push(&self, session_id: String, record: SpanRecord) {
        let Ok(mut spans) = self.spans.write() else {
            return;
        };
        let list = spans.entry(session_id).or_default();
        list.push(record);
        if let Some(capacity) = self.capacity {
            let excess = list.len().saturating_sub(capacity);
            list.drain(..excess);
        }
    }
}

/// A tracing layer that stores every closed span carrying a `session.id`
/// field (directly or through an ancestor) in a [`SpanStore`].
pub struct CaptureLayer {
    store: Arc<SpanStore>,
}

impl CaptureLayer {
    pub fn new(store: Arc<SpanStore>) -> Self {
        Self { store }
    }
}

struct SpanFields(HashMap<String, serde_json::Value>);

struct StartTime(u128);

fn now_nanos() -> u128 {
    SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default().as_nanos()
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &tracing::span::Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };

        let mut visitor = JsonVisitor::default();
        attrs.record(&mut visitor);
        let mut fields = visitor.0;

        // Child spans inherit the session of their parent.
        if !fields.contains_key(SESSION_FIELD) {
            let inherited = span.parent().and_then(|parent| {
                parent.extensions().get::<SpanFields>().and_then(|f| f.0.get(SESSION_FIELD).cloned())
            });
            if let Some(session) = inherited {
                fields.insert(SESSION_FIELD.to_string(), session);
            }
        }

        let mut extensions = span.extensions_mut();
        extensions.insert(StartTime(now_nanos()));
        extensions.insert(SpanFields(fields));
    }

    fn on_record(&self, id: &Id, values: &tracing::span::Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut extensions = span.extensions_mut();
        if let Some(fields) = extensions.get_mut::<SpanFields>() {
            let mut visitor = JsonVisitor::default();
            values.record(&mut visitor);
            fields.0.extend(visitor.0);
        }
    }

    fn on_close(&self, id: Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(&id) else {
            return;
        };
        let extensions = span.extensions();
        let Some(fields) = extensions.get::<SpanFields>() else {
            return;
        };
        let Some(session_id) = fields.0.get(SESSION_FIELD).and_then(|v| v.as_str()) else {
            return;
        };

        let record = SpanRecord {
            id: format!("{:016x}", id.into_u64()),
            name: span.metadata().name().to_string(),
            parent_id: span.parent().map(|p| format!("{:016x}", p.id().into_u64())),
            start_time: extensions.get::<StartTime>().map_or(0, |s| s.0),
            end_time: now_nanos(),
            attributes: fields.0.clone(),
        };
        self.store.push(session_id.to_string(), record);
    }
}

#[derive(Default)]
struct JsonVisitor(HashMap<String, serde_json::Value>);

impl tracing::field::Visit for JsonVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().to_string(), serde_json::Value::String(format!("{value:?}")));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.0.insert(field.name().to_string(), serde_json::Value::Bool(value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::info_span;
    use tracing_subscriber::layer::SubscriberExt;

    fn with_capture(store: &Arc<SpanStore>, f: impl FnOnce()) {
        let subscriber = tracing_subscriber::registry().with(CaptureLayer::new(store.clone()));
        tracing::subscriber::with_default(subscriber, f);
    }

    #[test]
    fn captures_spans_under_their_session() {
        let store = Arc::new(SpanStore::new());
        with_capture(&store, || {
            let span = info_span!("rag.ask", session.id = "s-1", passage_count = 3u64);
            let _guard = span.enter();
            tracing::info!("answering");
        });

        let spans = store.spans("s-1");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "rag.ask");
        assert_eq!(spans[0].attributes["passage_count"], serde_json::json!(3));
        assert!(spans[0].end_time >= spans[0].start_time);
        assert!(store.spans("s-2").is_empty());
    }

    #[test]
    fn children_inherit_the_session() {
        let store = Arc::new(SpanStore::new());
        with_capture(&store, || {
            let parent = info_span!("rag.ingest", session.id = "s-1");
            let _outer = parent.enter();
            let child = tracing::debug_span!("embedding.attempt", attempt = 1u64);
            drop(child.enter());
        });

        let names: Vec<String> = store.spans("s-1").into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["embedding.attempt", "rag.ingest"]);
        let child = &store.spans("s-1")[0];
        assert!(child.parent_id.is_some());
    }

    #[test]
    fn spans_without_session_are_ignored() {
        let store = Arc::new(SpanStore::new());
        with_capture(&store, || {
            drop(info_span!("startup").enter());
        });
        assert!(store.spans.read().unwrap().is_empty());
    }

    #[test]
    fn capacity_keeps_the_newest_spans() {
        let store = Arc::new(SpanStore::with_capacity(2));
        with_capture(&store, || {
            for name in ["one", "two", "three"] {
                drop(info_span!("step", session.id = "s-1", step = name).enter());
            }
        });

        let steps: Vec<_> = store.spans("s-1").into_iter().map(|s| s.attributes["step"].clone()).collect();
        assert_eq!(steps, vec![serde_json::json!("two"), serde_json::json!("three")]);

        store.clear("s-1");
        assert!(store.spans("s-1").is_empty());
    }

    #[test]
    fn record_serializes_with_snake_case_ids() {
        let record = SpanRecord {
            id: "00000000000000aa".into(),
            name: "rag.ask".into(),
            parent_id: None,
            start_time: 1_000_000,
            end_time: 3_500_000,
            attributes: HashMap::new(),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"span_id\""));
        assert!(!json.contains("parent_span_id"));
        assert_eq!(record.duration_ms(), 2.5);
    }
}
