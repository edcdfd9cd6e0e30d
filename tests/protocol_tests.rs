//! Tests for the text and binary protocol codecs

use ferrokv::protocol::{binary, text, Command, Request, Response, Status};

// =============================================================================
// Text Protocol: Requests
// =============================================================================

#[test]
fn test_text_encode_request() {
    assert_eq!(text::encode_request(&Request::get("foo")), b"GET foo\n");
    assert_eq!(
        text::encode_request(&Request::put("foo", "bar baz")),
        b"PUT foo bar baz\n"
    );
    assert_eq!(
        text::encode_request(&Request::put_ex("foo", "bar", 1500)),
        b"PUTEX foo 1500 bar\n"
    );
    assert_eq!(text::encode_request(&Request::del("foo")), b"DEL foo\n");
    assert_eq!(
        text::encode_request(&Request::bare(Command::Ping)),
        b"PING\n"
    );
}

#[test]
fn test_text_decode_request() {
    let req = text::decode_request(b"GET foo");
    assert_eq!(req.command, Command::Get);
    assert_eq!(req.key, b"foo");

    let req = text::decode_request(b"PUT foo bar baz");
    assert_eq!(req.command, Command::Put);
    assert_eq!(req.key, b"foo");
    assert_eq!(req.value, b"bar baz");

    let req = text::decode_request(b"PUTEX foo 2500 hello world");
    assert_eq!(req.command, Command::PutEx);
    assert_eq!(req.ttl_ms, 2500);
    assert_eq!(req.value, b"hello world");

    let req = text::decode_request(b"SIZE");
    assert_eq!(req.command, Command::Size);
}

#[test]
fn test_text_command_is_case_insensitive() {
    assert_eq!(text::decode_request(b"get foo").command, Command::Get);
    assert_eq!(text::decode_request(b"Put foo bar").command, Command::Put);
    assert_eq!(text::decode_request(b"pInG").command, Command::Ping);
}

#[test]
fn test_text_aliases() {
    assert_eq!(text::decode_request(b"SET k v").command, Command::Put);
    assert_eq!(text::decode_request(b"SETEX k 10 v").command, Command::PutEx);
    assert_eq!(text::decode_request(b"DELETE k").command, Command::Del);
    assert_eq!(text::decode_request(b"REMOVE k").command, Command::Del);
    assert_eq!(text::decode_request(b"CONTAINS k").command, Command::Exists);
    assert_eq!(text::decode_request(b"COUNT").command, Command::Size);
    assert_eq!(text::decode_request(b"EXIT").command, Command::Quit);
}

#[test]
fn test_text_missing_key_degrades_to_unknown() {
    assert_eq!(text::decode_request(b"GET").command, Command::Unknown);
    assert_eq!(text::decode_request(b"DEL").command, Command::Unknown);
    assert_eq!(text::decode_request(b"PUT onlykey").command, Command::Unknown);
    assert_eq!(
        text::decode_request(b"PUTEX key 100").command,
        Command::Unknown
    );
}

#[test]
fn test_text_bad_ttl_degrades_to_unknown() {
    assert_eq!(
        text::decode_request(b"PUTEX key abc value").command,
        Command::Unknown
    );
}

#[test]
fn test_text_unrecognized_command() {
    assert_eq!(text::decode_request(b"FROBNICATE x").command, Command::Unknown);
    assert_eq!(text::decode_request(b"").command, Command::Unknown);
}

#[test]
fn test_text_request_round_trip() {
    let requests = vec![
        Request::get("key"),
        Request::put("key", "some value here"),
        Request::put_ex("key", "v", 9999),
        Request::del("key"),
        Request::exists("key"),
        Request::bare(Command::Size),
        Request::bare(Command::Clear),
        Request::bare(Command::Ping),
        Request::bare(Command::Quit),
    ];
    for req in requests {
        let line = text::encode_request(&req);
        let decoded = text::decode_request(&line[..line.len() - 1]);
        assert_eq!(decoded, req, "round trip failed for {:?}", req);
    }
}

// =============================================================================
// Text Protocol: Responses
// =============================================================================

#[test]
fn test_text_encode_response() {
    assert_eq!(text::encode_response(&Response::ok()), b"OK\n");
    assert_eq!(text::encode_response(&Response::ok_with("bar")), b"OK bar\n");
    assert_eq!(text::encode_response(&Response::not_found()), b"NOT_FOUND\n");
    assert_eq!(
        text::encode_response(&Response::error("boom")),
        b"ERROR boom\n"
    );
    assert_eq!(text::encode_response(&Response::bye()), b"BYE\n");
}

#[test]
fn test_text_response_round_trip() {
    let responses = vec![
        Response::ok(),
        Response::ok_with("some data"),
        Response::not_found(),
        Response::error("message here"),
        Response::bye(),
    ];
    for resp in responses {
        let line = text::encode_response(&resp);
        let decoded = text::decode_response(&line[..line.len() - 1]);
        assert_eq!(decoded, resp, "round trip failed for {:?}", resp);
    }
}

#[test]
fn test_text_decode_unknown_response_is_error() {
    let resp = text::decode_response(b"GIBBERISH");
    assert_eq!(resp.status, Status::Error);
}

// =============================================================================
// Binary Protocol: Framing
// =============================================================================

#[test]
fn test_binary_request_round_trip() {
    let requests = vec![
        Request::get("key"),
        Request::put("key", "value"),
        Request::put_ex("key", "value", 123_456),
        Request::del("key"),
        Request::exists("key"),
        Request::bare(Command::Size),
        Request::bare(Command::Clear),
        Request::bare(Command::Ping),
        Request::bare(Command::Quit),
    ];
    for req in requests {
        let frame = binary::encode_request(&req);
        let (decoded, consumed) = binary::decode_request(&frame).unwrap().unwrap();
        assert_eq!(decoded, req, "round trip failed for {:?}", req);
        assert_eq!(consumed, frame.len());
    }
}

#[test]
fn test_binary_preserves_arbitrary_bytes() {
    let key = vec![0x00u8, 0x01, 0xFF, 0x0A, 0x0D];
    let value = vec![0x00u8, 0x00, 0xFE, b'\n', 0x80];
    let req = Request::put(key.clone(), value.clone());

    let frame = binary::encode_request(&req);
    let (decoded, _) = binary::decode_request(&frame).unwrap().unwrap();
    assert_eq!(decoded.key, key);
    assert_eq!(decoded.value, value);
}

#[test]
fn test_binary_response_round_trip() {
    let responses = vec![
        Response::ok(),
        Response::ok_with(vec![0x00u8, 0x01, 0x02, 0xFF]),
        Response::not_found(),
        Response::error("bad things"),
        Response::bye(),
    ];
    for resp in responses {
        let frame = binary::encode_response(&resp);
        let (decoded, consumed) = binary::decode_response(&frame).unwrap().unwrap();
        assert_eq!(decoded, resp, "round trip failed for {:?}", resp);
        assert_eq!(consumed, frame.len());
    }
}

#[test]
fn test_binary_get_response_payload_layout() {
    // status (1) + length prefix (4) + 4 data bytes after the frame length
    let resp = Response::ok_with(vec![0x00u8, 0x01, 0x02, 0xFF]);
    let frame = binary::encode_response(&resp);
    assert_eq!(frame.len(), 4 + 9);
    assert_eq!(&frame[..4], &9u32.to_be_bytes());
}

// =============================================================================
// Binary Protocol: Incremental Parsing
// =============================================================================

#[test]
fn test_binary_needs_more_bytes() {
    assert!(!binary::has_complete_message(&[]));
    assert!(!binary::has_complete_message(&[0x00, 0x00])); // partial length
    assert!(binary::decode_request(&[0x00, 0x00]).unwrap().is_none());

    let frame = binary::encode_request(&Request::get("key"));
    assert!(!binary::has_complete_message(&frame[..frame.len() - 1]));
    assert!(binary::decode_request(&frame[..frame.len() - 1])
        .unwrap()
        .is_none());
}

#[test]
fn test_binary_any_split_parses_once_complete() {
    let req = Request::put_ex("some-key", "some-value", 42);
    let frame = binary::encode_request(&req);

    for split in 0..frame.len() {
        let head = &frame[..split];
        assert!(
            binary::decode_request(head).unwrap().is_none(),
            "prefix of {} bytes should need more",
            split
        );

        let (decoded, consumed) = binary::decode_request(&frame).unwrap().unwrap();
        assert_eq!(decoded, req);
        assert_eq!(consumed, frame.len());
    }
}

#[test]
fn test_binary_trailing_bytes_left_for_next_message() {
    let first = binary::encode_request(&Request::get("a"));
    let second = binary::encode_request(&Request::del("b"));
    let mut buf = first.clone();
    buf.extend_from_slice(&second);

    let (decoded, consumed) = binary::decode_request(&buf).unwrap().unwrap();
    assert_eq!(decoded.command, Command::Get);
    assert_eq!(consumed, first.len());

    let (decoded2, consumed2) = binary::decode_request(&buf[consumed..]).unwrap().unwrap();
    assert_eq!(decoded2.command, Command::Del);
    assert_eq!(consumed2, second.len());
}

// =============================================================================
// Binary Protocol: Malformed Messages
// =============================================================================

#[test]
fn test_binary_empty_payload_is_error() {
    // complete frame with a zero-length payload
    let frame = 0u32.to_be_bytes();
    assert!(binary::decode_request(&frame).is_err());
}

#[test]
fn test_binary_unknown_command_byte_is_error() {
    let mut frame = Vec::new();
    frame.extend_from_slice(&1u32.to_be_bytes());
    frame.push(0xEE);
    assert!(binary::decode_request(&frame).is_err());
}

#[test]
fn test_binary_truncated_field_in_complete_message_is_error() {
    // GET frame whose payload claims a key longer than the payload
    let mut payload = vec![Command::Get as u8];
    payload.extend_from_slice(&100u32.to_be_bytes());
    payload.extend_from_slice(b"short");

    let mut frame = Vec::new();
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);

    assert!(binary::decode_request(&frame).is_err());
}

#[test]
fn test_binary_unknown_status_byte_is_error() {
    let mut frame = Vec::new();
    frame.extend_from_slice(&1u32.to_be_bytes());
    frame.push(0x7F);
    assert!(binary::decode_response(&frame).is_err());
}
