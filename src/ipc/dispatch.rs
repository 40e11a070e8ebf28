//! IPC message dispatch: parse s-expressions and route to handlers.

use lexpr::Value;
use tracing::{debug, warn};

use crate::controller::FrameReport;
use crate::gesture::continuous::PinchTarget;
use crate::gesture::cooldown::CooldownCategory;
use crate::gesture::predicates::{CameraOrientation, Finger};
use crate::gesture::{FrameInput, Handedness, HandStatus, LandmarkPoint};
use crate::state::PilotState;

use super::frame_slot::PendingFrame;

/// Parse an s-expression message and dispatch to the appropriate handler.
/// Returns an optional response string (s-expression).
pub fn handle_message(state: &mut PilotState, client_id: u64, raw: &str) -> Option<String> {
    let value = match lexpr::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            warn!(client_id, "malformed s-expression: {}", e);
            return Some(error_response(0, &format!("malformed s-expression: {e}")));
        }
    };

    let msg_type = get_keyword(&value, "type");
    let msg_id = get_int(&value, "id").unwrap_or(0);

    // hello must be first
    let is_authenticated = state
        .ipc_server
        .clients
        .get(&client_id)
        .map(|c| c.authenticated)
        .unwrap_or(false);

    match msg_type.as_deref() {
        Some("hello") => handle_hello(state, client_id, msg_id, &value),
        _ if !is_authenticated => Some(error_response(msg_id, "hello handshake required")),
        Some("ping") => handle_ping(state, msg_id, &value),
        Some("frame") => handle_frame(state, client_id, msg_id, &value),
        Some("engine-status") => handle_engine_status(state, msg_id),
        Some("engine-config") => handle_engine_config(state, msg_id, &value),
        Some("engine-stats") => handle_engine_stats(state, msg_id),
        Some("cooldown-status") => handle_cooldown_status(state, msg_id),
        Some("capabilities") => handle_capabilities(state, msg_id),
        Some("ipc-client-info") => handle_ipc_client_info(state, client_id, msg_id),
        Some("ipc-rate-limit") => handle_ipc_rate_limit(state, client_id, msg_id, &value),
        Some(other) => Some(error_response(
            msg_id,
            &format!("unknown message type: {other}"),
        )),
        None => Some(error_response(msg_id, "missing :type field")),
    }
}

// ── Handlers ────────────────────────────────────────────────

fn handle_hello(
    state: &mut PilotState,
    client_id: u64,
    msg_id: i64,
    value: &Value,
) -> Option<String> {
    let version = get_int(value, "version").unwrap_or(0);
    if version != 1 {
        return Some(error_response(
            msg_id,
            &format!("unsupported protocol version: {version}"),
        ));
    }

    // SO_PEERCRED: only the daemon's own user may drive the pointer.
    if let Some(client) = state.ipc_server.clients.get(&client_id) {
        if let Some(peer_uid) = client.peer_uid {
            let our_uid = unsafe { libc::getuid() };
            if peer_uid != our_uid {
                warn!(client_id, peer_uid, our_uid, "rejecting client: UID mismatch");
                return Some(error_response(msg_id, "authentication failed: UID mismatch"));
            }
        }
    }

    let client_name = get_string(value, "client").unwrap_or_default();
    debug!(client_id, client_name, "hello handshake (authenticated)");

    let mut peer_pid = None;
    if let Some(client) = state.ipc_server.clients.get_mut(&client_id) {
        client.authenticated = true;
        client.name = Some(client_name);
        peer_pid = client.peer_pid;
    }

    let pid_field = peer_pid
        .map(|p| format!(" :peer-pid {}", p))
        .unwrap_or_default();
    Some(format!(
        "(:type :hello :id {} :version 1 :server \"handpilot\" :sink \"{}\" :capabilities {}{})",
        msg_id,
        state.controller.sink_name(),
        state.controller.capabilities().to_sexp(),
        pid_field
    ))
}

fn handle_ping(state: &mut PilotState, msg_id: i64, value: &Value) -> Option<String> {
    let client_ts = get_int(value, "timestamp").unwrap_or(0);
    let server_ts = state.clock.unix_millis();

    Some(format!(
        "(:type :response :id {} :status :ok :client-timestamp {} :server-timestamp {})",
        msg_id, client_ts, server_ts
    ))
}

/// Frames are queued, not answered; the result arrives as a
/// `gesture-frame` event once the engine has run.
fn handle_frame(
    state: &mut PilotState,
    client_id: u64,
    msg_id: i64,
    value: &Value,
) -> Option<String> {
    let (input, timestamp_ms) = match parse_frame(value) {
        Ok(parsed) => parsed,
        Err(reason) => {
            debug!(client_id, "rejecting frame message: {}", reason);
            return Some(error_response(msg_id, &reason));
        }
    };

    if let Some(client) = state.ipc_server.clients.get_mut(&client_id) {
        client.frames_sent += 1;
    }
    if state.frame_slot.push(PendingFrame {
        input,
        timestamp_ms,
        client_id,
    }) {
        debug!(client_id, "unprocessed frame replaced");
    }
    None
}

fn handle_engine_status(state: &mut PilotState, msg_id: i64) -> Option<String> {
    Some(format!(
        "(:type :response :id {} :status :ok :engine {} :frames {})",
        msg_id,
        state.controller.status_sexp(),
        state.frame_slot.stats_sexp(),
    ))
}

/// Query or update engine configuration.  Every supplied key is
/// validated before any of them is applied.
fn handle_engine_config(state: &mut PilotState, msg_id: i64, value: &Value) -> Option<String> {
    let engine = &state.controller.engine;
    let mut classifier = engine.classifier.clone();
    let mut continuous = engine.continuous.clone();
    let mut scroll = engine.scroll.clone();
    let mut cooldown = engine.cooldowns.config.clone();
    let mut alpha = engine.smoother.config.alpha;
    let mut margin = engine.coordinate_margin;
    let mut screen = None;
    let mut changed = false;

    if let Some(t) = get_float(value, "pinch-threshold") {
        if !(t > 0.0 && t < 1.0) {
            return Some(error_response(msg_id, "pinch-threshold must be in (0, 1)"));
        }
        classifier.pinch_threshold = t as f32;
        changed = true;
    }
    if let Some(t) = get_float(value, "pointing-down-threshold") {
        if !(0.0..1.0).contains(&t) {
            return Some(error_response(msg_id, "pointing-down-threshold must be in [0, 1)"));
        }
        classifier.pointing_down_threshold = t as f32;
        changed = true;
    }
    if let Some(camera) = get_keyword(value, "camera") {
        match CameraOrientation::parse(&camera) {
            Some(o) => classifier.orientation = o,
            None => {
                return Some(error_response(
                    msg_id,
                    &format!("unknown camera orientation: {camera} (use mirrored or direct)"),
                ))
            }
        }
        changed = true;
    }
    if let Some(a) = get_float(value, "alpha") {
        if !(0.0..1.0).contains(&a) {
            return Some(error_response(msg_id, "alpha must be in [0, 1)"));
        }
        alpha = a;
        changed = true;
    }
    if let Some(target) = get_keyword(value, "pinch-target") {
        match PinchTarget::parse(&target) {
            Some(t) => continuous.pinch_target = t,
            None => {
                return Some(error_response(
                    msg_id,
                    &format!("unknown pinch target: {target} (use volume or brightness)"),
                ))
            }
        }
        changed = true;
    }
    if let Some(g) = get_float(value, "volume-gain") {
        if !(g > 0.0) {
            return Some(error_response(msg_id, "volume-gain must be positive"));
        }
        continuous.volume_gain = g as f32;
        changed = true;
    }
    if let Some(t) = get_float(value, "scroll-threshold") {
        if !(t > 0.0 && t < 1.0) {
            return Some(error_response(msg_id, "scroll-threshold must be in (0, 1)"));
        }
        scroll.delta_threshold = t as f32;
        changed = true;
    }
    if let Some(n) = get_int(value, "scroll-amount") {
        if !(1..=100).contains(&n) {
            return Some(error_response(msg_id, "scroll-amount must be 1-100"));
        }
        scroll.amount = n as u32;
        changed = true;
    }
    if let Some(m) = get_float(value, "coordinate-margin") {
        if !(0.0..=0.5).contains(&m) {
            return Some(error_response(msg_id, "coordinate-margin must be in [0, 0.5]"));
        }
        margin = m as f32;
        changed = true;
    }
    match (get_int(value, "screen-width"), get_int(value, "screen-height")) {
        (None, None) => {}
        (Some(w), Some(h)) if w > 0 && h > 0 && w <= 16384 && h <= 16384 => {
            screen = Some((w as u32, h as u32));
            changed = true;
        }
        _ => {
            return Some(error_response(
                msg_id,
                "screen-width and screen-height must both be 1-16384",
            ))
        }
    }
    for category in CooldownCategory::ALL {
        let key = format!("{}-cooldown-ms", category.as_str());
        if let Some(ms) = get_float(value, &key) {
            if !(0.0..=60_000.0).contains(&ms) {
                return Some(error_response(msg_id, &format!("{key} must be 0-60000")));
            }
            cooldown.set_duration_ms(category, ms);
            changed = true;
        }
    }

    let engine = &mut state.controller.engine;
    if changed {
        engine.classifier = classifier;
        engine.continuous = continuous;
        engine.scroll = scroll;
        engine.cooldowns.config = cooldown;
        engine.smoother.config.alpha = alpha;
        engine.coordinate_margin = margin;
        if let Some((w, h)) = screen {
            engine.smoother.set_screen(w, h);
        }
        debug!("engine config updated: {}", engine.config_sexp());
    }

    Some(format!(
        "(:type :response :id {} :status :ok :config {})",
        msg_id,
        engine.config_sexp()
    ))
}

fn handle_engine_stats(state: &mut PilotState, msg_id: i64) -> Option<String> {
    let c = &state.controller;
    Some(format!(
        "(:type :response :id {} :status :ok :engine {} :timing {} :frames {} :sink-failures {})",
        msg_id,
        c.engine.stats_sexp(),
        c.timing.stats_sexp(),
        state.frame_slot.stats_sexp(),
        c.sink_failures(),
    ))
}

fn handle_cooldown_status(state: &mut PilotState, msg_id: i64) -> Option<String> {
    // Cooldowns run on frame time; report as of the last frame.
    let now_ms = state
        .controller
        .last_report()
        .map(|r| r.outcome.timestamp_ms)
        .unwrap_or_else(|| state.clock.now_ms());
    Some(format!(
        "(:type :response :id {} :status :ok :cooldowns {})",
        msg_id,
        state.controller.engine.cooldowns.status_sexp(now_ms)
    ))
}

fn handle_capabilities(state: &mut PilotState, msg_id: i64) -> Option<String> {
    Some(format!(
        "(:type :response :id {} :status :ok :sink \"{}\" :capabilities {})",
        msg_id,
        state.controller.sink_name(),
        state.controller.capabilities().to_sexp()
    ))
}

fn handle_ipc_client_info(state: &mut PilotState, client_id: u64, msg_id: i64) -> Option<String> {
    let client = state.ipc_server.clients.get(&client_id)?;
    Some(format!(
        "(:type :response :id {} :status :ok :client-id {} :name \"{}\" :peer-uid {} :peer-pid {} :frames-sent {} :rate-limit {})",
        msg_id,
        client.id,
        escape_string(client.name.as_deref().unwrap_or("")),
        client.peer_uid.map(|u| u.to_string()).unwrap_or_else(|| "nil".into()),
        client.peer_pid.map(|p| p.to_string()).unwrap_or_else(|| "nil".into()),
        client.frames_sent,
        client.rate_limiter.max_per_second,
    ))
}

fn handle_ipc_rate_limit(
    state: &mut PilotState,
    client_id: u64,
    msg_id: i64,
    value: &Value,
) -> Option<String> {
    let new_limit = match get_int(value, "limit") {
        Some(n) if n > 0 && n <= 10000 => n as u32,
        Some(_) => return Some(error_response(msg_id, "limit must be 1-10000")),
        None => return Some(error_response(msg_id, "missing :limit parameter")),
    };

    if let Some(client) = state.ipc_server.clients.get_mut(&client_id) {
        client.rate_limiter.max_per_second = new_limit;
        debug!(client_id, new_limit, "rate limit updated");
    }
    Some(ok_response(msg_id))
}

// ── Frames ─────────────────────────────────────────────────

/// Parse a `frame` message into engine input and optional timestamp.
///
/// `:landmarks` missing, `nil` or `()` means no hand.  A landmark list of
/// the wrong length is passed through; the engine reports it as
/// malformed.  Non-numeric coordinates are a protocol error.
pub fn parse_frame(value: &Value) -> Result<(FrameInput, Option<f64>), String> {
    let timestamp_ms = match get_value(value, "timestamp-ms") {
        None => None,
        Some(v) if is_nil(v) => None,
        Some(Value::Number(n)) => Some(
            n.as_f64()
                .ok_or_else(|| "timestamp-ms is not representable".to_string())?,
        ),
        Some(other) => return Err(format!("timestamp-ms must be a number, got {other}")),
    };

    let landmarks = match get_value(value, "landmarks") {
        None => return Ok((FrameInput::NoHand, timestamp_ms)),
        Some(v) if is_nil(v) => return Ok((FrameInput::NoHand, timestamp_ms)),
        Some(v) => v,
    };

    let entries = elements(landmarks).ok_or_else(|| "landmarks must be a list".to_string())?;
    let mut points = Vec::with_capacity(entries.len());
    for (i, entry) in entries.into_iter().enumerate() {
        let coords = elements(entry)
            .ok_or_else(|| format!("landmark {i} must be a list of numbers"))?;
        if coords.len() < 2 || coords.len() > 3 {
            return Err(format!("landmark {i} must have 2 or 3 coordinates"));
        }
        let mut xyz = [0.0f32; 3];
        for (slot, coord) in xyz.iter_mut().zip(coords) {
            *slot = match coord {
                Value::Number(n) => n.as_f64().map(|f| f as f32),
                _ => None,
            }
            .ok_or_else(|| format!("landmark {i} has a non-numeric coordinate"))?;
        }
        points.push(LandmarkPoint::new(xyz[0], xyz[1], xyz[2]));
    }

    let handedness = get_keyword(value, "handedness")
        .and_then(|h| Handedness::parse(&h.to_ascii_lowercase()));

    Ok((FrameInput::Hand { points, handedness }, timestamp_ms))
}

fn is_nil(value: &Value) -> bool {
    match value {
        Value::Nil | Value::Null => true,
        Value::Symbol(s) => s.as_ref() == "nil",
        _ => false,
    }
}

/// Elements of a list or vector value.
fn elements(value: &Value) -> Option<Vec<&Value>> {
    match value {
        Value::Vector(items) => Some(items.iter().collect()),
        Value::Cons(_) | Value::Null => value.list_iter().map(|it| it.collect()),
        _ => None,
    }
}

/// Format the per-frame broadcast event.
pub fn format_frame_event(report: &FrameReport) -> String {
    let outcome = &report.outcome;
    let hand = match &outcome.hand {
        HandStatus::NoHand => ":none".to_string(),
        HandStatus::Malformed(e) => format!(":malformed :error :{}", e.as_str()),
        HandStatus::Present => ":present".to_string(),
    };
    let gesture = outcome
        .gesture()
        .map(|g| format!(":{}", g.as_str()))
        .unwrap_or_else(|| "nil".to_string());
    let fingers = outcome
        .classification
        .map(|c| {
            let parts: Vec<String> = Finger::ALL
                .iter()
                .map(|f| format!(":{} {}", f.as_str(), if c.fingers.get(*f) { "t" } else { "nil" }))
                .collect();
            format!("({})", parts.join(" "))
        })
        .unwrap_or_else(|| "nil".to_string());
    let cursor = outcome
        .cursor
        .map(|c| format!("(:x {} :y {})", c.x, c.y))
        .unwrap_or_else(|| "nil".to_string());
    let reading = outcome
        .reading
        .map(|r| {
            format!(
                "(:pinch-distance {:.4} :volume {:.3} :brightness {})",
                r.pinch_distance, r.volume, r.brightness
            )
        })
        .unwrap_or_else(|| "nil".to_string());
    let actions = sexp_list(report.executed.iter().map(|a| a.to_sexp()));
    let declined = sexp_list(report.declined.iter().map(|(a, _)| a.to_sexp()));

    let timestamp = format!("{:.1}", outcome.timestamp_ms);
    let status = format!("\"{}\"", escape_string(&report.status));
    format_event(
        "gesture-frame",
        &[
            ("timestamp-ms", &timestamp),
            ("status", &status),
            ("hand", &hand),
            ("gesture", &gesture),
            ("fingers", &fingers),
            ("cursor", &cursor),
            ("reading", &reading),
            ("actions", &actions),
            ("declined", &declined),
        ],
    )
}

fn sexp_list(items: impl Iterator<Item = String>) -> String {
    let items: Vec<String> = items.collect();
    if items.is_empty() {
        "nil".to_string()
    } else {
        format!("({})", items.join(" "))
    }
}

// ── Helpers ────────────────────────────────────────────────

fn ok_response(id: i64) -> String {
    format!("(:type :response :id {} :status :ok)", id)
}

fn error_response(id: i64, reason: &str) -> String {
    format!(
        "(:type :response :id {} :status :error :reason \"{}\")",
        id,
        escape_string(reason)
    )
}

/// Escape a string for s-expression output.
pub fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// The value following `:key` in a plist.
/// Handles both `Value::Keyword("key")` (elisp parser) and
/// `Value::Symbol(":key")` (default parser) forms.
fn get_value<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let prefixed = format!(":{}", key);
    let mut current = value;
    while let Value::Cons(pair) = current {
        let is_key = match pair.car() {
            Value::Keyword(k) => k.as_ref() == key,
            Value::Symbol(s) => s.as_ref() == prefixed,
            _ => false,
        };
        let Value::Cons(value_cell) = pair.cdr() else {
            return None;
        };
        if is_key {
            return Some(value_cell.car());
        }
        // Skip the value so only key positions are compared.
        current = value_cell.cdr();
    }
    None
}

/// Extract a keyword value from an s-expression plist as a string.
fn get_keyword(value: &Value, key: &str) -> Option<String> {
    let val = get_value(value, key)?;
    Some(match val {
        Value::Keyword(v) => v.to_string(),
        Value::Symbol(v) => {
            let s = v.to_string();
            s.strip_prefix(':').unwrap_or(&s).to_string()
        }
        Value::String(v) => v.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => if *b { "t" } else { "nil" }.to_string(),
        Value::Null | Value::Nil => "nil".to_string(),
        _ => val.to_string(),
    })
}

/// Extract an integer value from an s-expression plist.
fn get_int(value: &Value, key: &str) -> Option<i64> {
    get_keyword(value, key).and_then(|s| s.parse().ok())
}

/// Extract a string value from an s-expression plist.
fn get_string(value: &Value, key: &str) -> Option<String> {
    get_keyword(value, key)
}

/// Extract a floating-point value from an s-expression plist.
fn get_float(value: &Value, key: &str) -> Option<f64> {
    get_keyword(value, key).and_then(|s| s.parse().ok())
}

/// Format an IPC event s-expression.
pub fn format_event(event_type: &str, fields: &[(&str, &str)]) -> String {
    let mut s = format!("(:type :event :event :{}", event_type);
    for (key, val) in fields {
        s.push_str(&format!(" :{} {}", key, val));
    }
    s.push(')');
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::classifier::poses;
    use crate::state::make_state;
    use std::os::unix::net::UnixStream;

    fn connect(state: &mut PilotState) -> (u64, UnixStream) {
        let (ours, theirs) = UnixStream::pair().unwrap();
        (state.ipc_server.add_client(ours), theirs)
    }

    fn authed(state: &mut PilotState) -> (u64, UnixStream) {
        let (id, peer) = connect(state);
        let r = handle_message(state, id, "(:type :hello :id 1 :version 1 :client \"test\")").unwrap();
        assert!(r.starts_with("(:type :hello"), "hello failed: {}", r);
        (id, peer)
    }

    fn landmarks_sexp(points: &[LandmarkPoint]) -> String {
        let pts: Vec<String> = points
            .iter()
            .map(|p| format!("({} {} {})", p.x, p.y, p.z))
            .collect();
        format!("({})", pts.join(" "))
    }

    fn parse(raw: &str) -> Value {
        lexpr::from_str(raw).unwrap()
    }

    // ── ok_response / error_response ────────────────────────

    #[test]
    fn test_ok_response_format() {
        let r = ok_response(42);
        assert!(r.contains(":type :response"));
        assert!(r.contains(":id 42"));
        assert!(r.contains(":status :ok"));
    }

    #[test]
    fn test_error_response_escapes_quotes() {
        let r = error_response(1, "say \"hello\"");
        assert!(r.contains("say \\\"hello\\\""));
        assert!(lexpr::from_str(&r).is_ok());
    }

    #[test]
    fn test_escape_string_both() {
        assert_eq!(escape_string("\"\\\""), "\\\"\\\\\\\"");
    }

    // ── plist helpers ───────────────────────────────────────

    #[test]
    fn test_get_keyword_from_plist() {
        let v = parse("(:type :hello :version 1 :client \"emacs\")");
        assert_eq!(get_keyword(&v, "type"), Some("hello".to_string()));
        assert_eq!(get_int(&v, "version"), Some(1));
        assert_eq!(get_string(&v, "client"), Some("emacs".to_string()));
        assert_eq!(get_keyword(&v, "nonexistent"), None);
    }

    #[test]
    fn test_get_float() {
        let v = parse("(:alpha 0.5 :gain 10)");
        assert_eq!(get_float(&v, "alpha"), Some(0.5));
        assert_eq!(get_float(&v, "gain"), Some(10.0));
    }

    #[test]
    fn test_get_value_ignores_value_positions() {
        let v = parse("(:type :event :event :gesture-frame :source :client :client \"emacs\")");
        assert_eq!(get_keyword(&v, "type"), Some("event".to_string()));
        assert_eq!(get_keyword(&v, "event"), Some("gesture-frame".to_string()));
        assert_eq!(get_string(&v, "client"), Some("emacs".to_string()));
        assert_eq!(get_keyword(&v, "gesture-frame"), None);
    }

    #[test]
    fn test_get_value_trailing_key() {
        let v = parse("(:type :frame :landmarks)");
        assert!(get_value(&v, "landmarks").is_none());
    }

    // ── parse_frame ─────────────────────────────────────────

    #[test]
    fn test_parse_frame_no_hand_forms() {
        for raw in [
            "(:type :frame)",
            "(:type :frame :landmarks nil)",
            "(:type :frame :landmarks ())",
        ] {
            let (input, ts) = parse_frame(&parse(raw)).unwrap();
            assert_eq!(input, FrameInput::NoHand, "{raw}");
            assert_eq!(ts, None);
        }
    }

    #[test]
    fn test_parse_frame_hand() {
        let raw = format!(
            "(:type :frame :timestamp-ms 1500 :handedness :left :landmarks {})",
            landmarks_sexp(&poses::fist())
        );
        let (input, ts) = parse_frame(&parse(&raw)).unwrap();
        assert_eq!(ts, Some(1500.0));
        match input {
            FrameInput::Hand { points, handedness } => {
                assert_eq!(points.len(), 21);
                assert_eq!(handedness, Some(Handedness::Left));
                assert_eq!(points, poses::fist());
            }
            other => panic!("expected hand, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_frame_two_coordinates_and_vectors() {
        let (input, _) = parse_frame(&parse("(:landmarks ((0.5 0.25) #(0.1 0.2 0.3)))")).unwrap();
        match input {
            FrameInput::Hand { points, handedness } => {
                assert_eq!(points[0], LandmarkPoint::new(0.5, 0.25, 0.0));
                assert_eq!(points[1], LandmarkPoint::new(0.1, 0.2, 0.3));
                assert_eq!(handedness, None);
            }
            other => panic!("expected hand, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_frame_short_list_passes_through() {
        let (input, _) = parse_frame(&parse("(:landmarks ((0.1 0.1 0) (0.2 0.2 0)))")).unwrap();
        assert!(matches!(input, FrameInput::Hand { ref points, .. } if points.len() == 2));
    }

    #[test]
    fn test_parse_frame_rejects_garbage() {
        assert!(parse_frame(&parse("(:landmarks 5)")).is_err());
        assert!(parse_frame(&parse("(:landmarks ((0.1 \"y\" 0)))")).is_err());
        assert!(parse_frame(&parse("(:landmarks ((0.1)))")).is_err());
        assert!(parse_frame(&parse("(:timestamp-ms \"now\")")).is_err());
    }

    // ── Dispatch ────────────────────────────────────────────

    #[test]
    fn test_hello_required() {
        let mut state = make_state();
        let (id, _peer) = connect(&mut state);
        let r = handle_message(&mut state, id, "(:type :ping :id 3)").unwrap();
        assert!(r.contains("hello handshake required"));
    }

    #[test]
    fn test_hello_bad_version() {
        let mut state = make_state();
        let (id, _peer) = connect(&mut state);
        let r = handle_message(&mut state, id, "(:type :hello :id 1 :version 2)").unwrap();
        assert!(r.contains("unsupported protocol version: 2"));
    }

    #[test]
    fn test_hello_reports_capabilities() {
        let mut state = make_state();
        let (id, _peer) = connect(&mut state);
        let r = handle_message(&mut state, id, "(:type :hello :id 1 :version 1)").unwrap();
        let v = parse(&r);
        assert_eq!(get_string(&v, "server"), Some("handpilot".to_string()));
        assert!(r.contains(":capabilities (:pointer t :keys t :volume t :brightness t)"));
        assert!(state.ipc_server.clients[&id].authenticated);
    }

    #[test]
    fn test_malformed_message() {
        let mut state = make_state();
        let (id, _peer) = connect(&mut state);
        let r = handle_message(&mut state, id, "(:type :hello").unwrap();
        assert!(r.contains("malformed s-expression"));
    }

    #[test]
    fn test_unknown_type() {
        let mut state = make_state();
        let (id, _peer) = authed(&mut state);
        let r = handle_message(&mut state, id, "(:type :dance :id 9)").unwrap();
        assert!(r.contains("unknown message type: dance"));
    }

    #[test]
    fn test_frame_queues_without_response() {
        let mut state = make_state();
        let (id, _peer) = authed(&mut state);
        let raw = format!(
            "(:type :frame :timestamp-ms 0 :landmarks {})",
            landmarks_sexp(&poses::fist())
        );
        assert!(handle_message(&mut state, id, &raw).is_none());
        assert!(state.frame_slot.is_pending());
        assert_eq!(state.ipc_server.clients[&id].frames_sent, 1);

        let report = state.process_pending_frame().unwrap();
        assert_eq!(report.status, "Left Click");
    }

    #[test]
    fn test_frame_event_broadcast_to_authenticated_only() {
        let mut state = make_state();
        let (authed_id, _p1) = authed(&mut state);
        let (anon_id, _p2) = connect(&mut state);
        for c in state.ipc_server.clients.values_mut() {
            c.write_buf.clear();
        }
        handle_message(&mut state, authed_id, "(:type :frame :landmarks nil)");
        state.process_pending_frame();
        assert!(!state.ipc_server.clients[&authed_id].write_buf.is_empty());
        assert!(state.ipc_server.clients[&anon_id].write_buf.is_empty());
    }

    #[test]
    fn test_frame_newest_wins() {
        let mut state = make_state();
        let (id, _peer) = authed(&mut state);
        let fist = format!("(:type :frame :timestamp-ms 0 :landmarks {})", landmarks_sexp(&poses::fist()));
        handle_message(&mut state, id, &fist);
        handle_message(&mut state, id, "(:type :frame :timestamp-ms 33 :landmarks nil)");
        let report = state.process_pending_frame().unwrap();
        assert_eq!(report.status, "No Hand Detected");
        assert_eq!(state.frame_slot.dropped(), 1);
    }

    #[test]
    fn test_bad_frame_gets_error() {
        let mut state = make_state();
        let (id, _peer) = authed(&mut state);
        let r = handle_message(&mut state, id, "(:type :frame :id 4 :landmarks 7)").unwrap();
        assert!(r.contains(":status :error"));
        assert!(!state.frame_slot.is_pending());
    }

    #[test]
    fn test_engine_config_query() {
        let mut state = make_state();
        let (id, _peer) = authed(&mut state);
        let r = handle_message(&mut state, id, "(:type :engine-config :id 2)").unwrap();
        assert!(r.contains(":status :ok"));
        assert!(r.contains(":pinch-threshold 0.150"));
        assert!(lexpr::from_str(&r).is_ok());
    }

    #[test]
    fn test_engine_config_update() {
        let mut state = make_state();
        let (id, _peer) = authed(&mut state);
        let r = handle_message(
            &mut state,
            id,
            "(:type :engine-config :id 2 :pinch-threshold 0.1 :camera :direct :pinch-target :brightness :click-cooldown-ms 500 :screen-width 1280 :screen-height 720)",
        )
        .unwrap();
        assert!(r.contains(":status :ok"), "{}", r);
        let engine = &state.controller.engine;
        assert!((engine.classifier.pinch_threshold - 0.1).abs() < 1e-6);
        assert_eq!(engine.classifier.orientation, CameraOrientation::Direct);
        assert_eq!(engine.continuous.pinch_target, PinchTarget::Brightness);
        assert_eq!(engine.cooldowns.config.click_ms, 500.0);
        assert_eq!(engine.smoother.config.screen_width, 1280);
    }

    #[test]
    fn test_engine_config_rejects_atomically() {
        let mut state = make_state();
        let (id, _peer) = authed(&mut state);
        let r = handle_message(
            &mut state,
            id,
            "(:type :engine-config :id 2 :pinch-threshold 0.1 :alpha 1.5)",
        )
        .unwrap();
        assert!(r.contains("alpha must be in [0, 1)"));
        assert!((state.controller.engine.classifier.pinch_threshold - 0.15).abs() < 1e-6);
    }

    #[test]
    fn test_engine_config_screen_needs_both() {
        let mut state = make_state();
        let (id, _peer) = authed(&mut state);
        let r = handle_message(&mut state, id, "(:type :engine-config :id 2 :screen-width 800)").unwrap();
        assert!(r.contains(":status :error"));
    }

    #[test]
    fn test_engine_status_and_stats() {
        let mut state = make_state();
        let (id, _peer) = authed(&mut state);
        let r = handle_message(&mut state, id, "(:type :engine-status :id 5)").unwrap();
        assert!(r.contains(":engine (:status \"No Hand Detected\""));
        assert!(lexpr::from_str(&r).is_ok(), "{}", r);

        let r = handle_message(&mut state, id, "(:type :engine-stats :id 6)").unwrap();
        assert!(r.contains(":frames (:received 0 :dropped 0 :pending nil)"));
        assert!(r.contains(":timing (:interval-p50"));
        assert!(lexpr::from_str(&r).is_ok(), "{}", r);
    }

    #[test]
    fn test_cooldown_status() {
        let mut state = make_state();
        let (id, _peer) = authed(&mut state);
        let r = handle_message(&mut state, id, "(:type :cooldown-status :id 7)").unwrap();
        assert!(r.contains("(:category :click :cooldown-ms 1000"));
        assert!(lexpr::from_str(&r).is_ok());
    }

    #[test]
    fn test_capabilities() {
        let mut state = make_state();
        let (id, _peer) = authed(&mut state);
        let r = handle_message(&mut state, id, "(:type :capabilities :id 8)").unwrap();
        assert!(r.contains(":sink \"recording\""));
    }

    #[test]
    fn test_rate_limit_update() {
        let mut state = make_state();
        let (id, _peer) = authed(&mut state);
        let r = handle_message(&mut state, id, "(:type :ipc-rate-limit :id 1 :limit 50)").unwrap();
        assert!(r.contains(":status :ok"));
        assert_eq!(state.ipc_server.clients[&id].rate_limiter.max_per_second, 50);
        let r = handle_message(&mut state, id, "(:type :ipc-rate-limit :id 1 :limit 0)").unwrap();
        assert!(r.contains("limit must be 1-10000"));
    }

    #[test]
    fn test_client_info() {
        let mut state = make_state();
        let (id, _peer) = authed(&mut state);
        let r = handle_message(&mut state, id, "(:type :ipc-client-info :id 1)").unwrap();
        assert!(r.contains(":name \"test\""));
        assert!(lexpr::from_str(&r).is_ok());
    }

    // ── Events ──────────────────────────────────────────────

    #[test]
    fn test_format_event_with_fields() {
        let e = format_event("gesture-frame", &[("status", "\"Tracking\"")]);
        assert_eq!(e, "(:type :event :event :gesture-frame :status \"Tracking\")");
    }

    #[test]
    fn test_frame_event_contents() {
        let mut state = make_state();
        state.frame_slot.push(PendingFrame {
            input: FrameInput::Hand {
                points: poses::fist(),
                handedness: Some(Handedness::Right),
            },
            timestamp_ms: Some(0.0),
            client_id: 1,
        });
        let report = state.process_pending_frame().unwrap();
        let event = format_frame_event(&report);
        let v = parse(&event);
        assert_eq!(get_keyword(&v, "event"), Some("gesture-frame".to_string()));
        assert_eq!(get_string(&v, "status"), Some("Left Click".to_string()));
        assert_eq!(get_keyword(&v, "gesture"), Some("fist".to_string()));
        assert!(event.contains(":fingers (:thumb nil :index nil :middle nil :ring nil :pinky nil)"));
        assert!(event.contains("(:action :left-click)"));
        assert!(event.contains(":declined nil"));
    }

    #[test]
    fn test_frame_event_malformed() {
        let mut state = make_state();
        state.frame_slot.push(PendingFrame {
            input: FrameInput::Hand {
                points: vec![LandmarkPoint::default(); 3],
                handedness: None,
            },
            timestamp_ms: Some(0.0),
            client_id: 1,
        });
        let report = state.process_pending_frame().unwrap();
        let event = format_frame_event(&report);
        assert!(event.contains(":hand :malformed :error :wrong-point-count"));
        assert!(lexpr::from_str(&event).is_ok(), "{}", event);
    }
}
