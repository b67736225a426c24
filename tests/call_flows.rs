use sip_call_scanner::packet::normalize_call_id;
use sip_call_scanner::types::Direction;
use sip_call_scanner::{scan, CallIndex, ScanConfig, Selection};

fn scan_str(input: &str, config: ScanConfig) -> CallIndex {
    scan(input.as_bytes(), config).unwrap()
}

fn block(marker: &str, start: &str, headers: &[&str]) -> String {
    let mut out = String::new();
    out.push_str(marker);
    out.push('\n');
    out.push_str(start);
    out.push('\n');
    for h in headers {
        out.push_str(h);
        out.push('\n');
    }
    out.push('\n');
    out
}

const OUT: &str = "Reliably Transmitting (NAT) to 192.168.10.5:5060:";
const IN: &str = "<--- SIP read from UDP:192.168.10.5:5060 --->";

#[test]
fn invite_block_becomes_call_record() {
    let input = block(
        OUT,
        "INVITE sip:555-1212@host SIP/2.0",
        &[
            "From: \"Alice\" <sip:1002@host>",
            "To: <sip:555-1212@host>",
            "Call-ID: abc123@host",
        ],
    );
    let index = scan_str(&input, ScanConfig::default());
    assert_eq!(index.len(), 1);
    let rec = index.get("abc123").unwrap();
    assert_eq!(rec.caller_number.as_deref(), Some("1002"));
    assert_eq!(rec.callee_number.as_deref(), Some("555-1212"));
    assert_eq!(rec.packets().len(), 1);
    assert_eq!(rec.packets()[0].direction, Direction::Outbound);
    assert!(rec.packets()[0].message_type.is_session_initiating());
}

#[test]
fn status_without_prior_invite_creates_nothing() {
    let input = block(
        IN,
        "SIP/2.0 200 OK",
        &[
            "From: <sip:1002@host>;tag=1",
            "To: <sip:1002@host>;tag=2",
            "Call-ID: abc123@host",
            "CSeq: 3 REGISTER",
        ],
    );
    let index = scan_str(&input, ScanConfig::default());
    assert!(index.get("abc123").is_none());
    assert!(index.is_empty());
}

#[test]
fn number_filter_keeps_one_of_two_calls() {
    let mut input = block(
        OUT,
        "INVITE sip:2000@host SIP/2.0",
        &[
            "From: <sip:1002@host>;tag=1",
            "To: <sip:2000@host>",
            "Call-ID: first@host",
        ],
    );
    input.push_str(&block(
        OUT,
        "INVITE sip:4000@host SIP/2.0",
        &[
            "From: <sip:3000@host>;tag=1",
            "To: <sip:4000@host>",
            "Call-ID: second@host",
        ],
    ));
    let index = scan_str(&input, ScanConfig::with_selection(Selection::number("1002")));
    assert_eq!(index.len(), 1);
    assert!(index.get("first").is_some());
}

#[test]
fn compact_call_id_alias() {
    let headers = ["From: <sip:1@host>", "To: <sip:2@host>"];
    let long = block(
        OUT,
        "INVITE sip:2@host SIP/2.0",
        &[headers[0], headers[1], "Call-ID: xyz@host"],
    );
    let compact = block(
        OUT,
        "INVITE sip:2@host SIP/2.0",
        &[headers[0], headers[1], "I: xyz@host"],
    );
    let a = scan_str(&long, ScanConfig::default());
    let b = scan_str(&compact, ScanConfig::default());
    assert!(a.get("xyz").is_some());
    assert_eq!(a.get("xyz"), b.get("xyz"));
}

#[test]
fn packets_keep_log_order_and_duplicates() {
    let mut input = block(
        OUT,
        "INVITE sip:2@host SIP/2.0",
        &["Call-ID: ord@host"],
    );
    for status in ["SIP/2.0 100 Trying", "SIP/2.0 180 Ringing", "SIP/2.0 180 Ringing", "SIP/2.0 200 OK"] {
        input.push_str(&block(IN, status, &["Call-ID: ord@host"]));
    }
    input.push_str(&block(OUT, "ACK sip:2@host SIP/2.0", &["Call-ID: ord@host"]));

    let index = scan_str(&input, ScanConfig::default());
    let labels: Vec<_> = index
        .get("ord")
        .unwrap()
        .packets()
        .iter()
        .map(|p| p.message_type.label())
        .collect();
    assert_eq!(
        labels,
        ["INVITE", "100 Trying", "180 Ringing", "180 Ringing", "200 OK", "ACK"]
    );
}

#[test]
fn identity_first_write_wins_across_blocks() {
    let mut input = block(
        OUT,
        "INVITE sip:2000@host SIP/2.0",
        &[
            "From: \"Alice\" <sip:1002@host>;tag=1",
            "To: <sip:2000@host>",
            "Call-ID: fw@host",
            "User-Agent: First UA",
        ],
    );
    input.push_str(&block(
        OUT,
        "INVITE sip:9999@host SIP/2.0",
        &[
            "From: \"Mallory\" <sip:6666@host>;tag=1",
            "To: \"Target\" <sip:9999@host>",
            "Call-ID: fw@host",
            "User-Agent: Second UA",
        ],
    ));
    let index = scan_str(&input, ScanConfig::default());
    let rec = index.get("fw").unwrap();
    assert_eq!(rec.caller_name.as_deref(), Some("Alice"));
    assert_eq!(rec.caller_number.as_deref(), Some("1002"));
    assert_eq!(rec.callee_number.as_deref(), Some("2000"));
    // the name was never set by the first block, so the second one fills it
    assert_eq!(rec.callee_name.as_deref(), Some("Target"));
    assert_eq!(rec.dialed_number.as_deref(), Some("2000"));
    assert_eq!(rec.origin_agent.as_deref(), Some("First UA"));
    assert_eq!(rec.packets().len(), 2);
}

#[test]
fn call_id_normalization_is_idempotent() {
    for raw in ["abc123@host", "abc123", "abc 123  @x@y", "@only-host", "trailing   "] {
        let once = normalize_call_id(raw);
        assert_eq!(normalize_call_id(once), once);
    }
}

#[test]
fn call_id_filter_matches_raw_value() {
    let mut input = block(OUT, "INVITE sip:2@host SIP/2.0", &["Call-ID: a1@edge.example"]);
    input.push_str(&block(OUT, "INVITE sip:2@host SIP/2.0", &["Call-ID: a2@core.example"]));
    let config = ScanConfig::with_selection(Selection::call_id(r"@edge\.example$").unwrap());
    let index = scan_str(&input, config);
    assert_eq!(index.len(), 1);
    assert!(index.get("a1").is_some());
}
