// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire format tests: length-prefix framing and JSON encoding.

use super::*;

#[tokio::test]
async fn write_message_adds_length_prefix() {
    let data = b"test data";

    let mut buffer = Vec::new();
    write_message(&mut buffer, data).await.expect("write failed");

    let len = u32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]) as usize;
    assert_eq!(len, data.len());
    assert_eq!(&buffer[4..], data);

    let mut cursor = std::io::Cursor::new(buffer);
    assert_eq!(read_message(&mut cursor).await.expect("read failed"), data);
}

#[tokio::test]
async fn empty_stream_is_connection_closed() {
    let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
    assert!(matches!(read_message(&mut cursor).await, Err(ProtocolError::ConnectionClosed)));
}

#[tokio::test]
async fn oversized_length_is_rejected_before_reading_body() {
    let len = (MAX_MESSAGE_SIZE as u32 + 1).to_be_bytes();
    let mut cursor = std::io::Cursor::new(len.to_vec());
    assert!(matches!(
        read_message(&mut cursor).await,
        Err(ProtocolError::MessageTooLarge { size, .. }) if size == MAX_MESSAGE_SIZE + 1
    ));
}

#[tokio::test]
async fn request_reads_back_from_framed_bytes() {
    let mut buffer = Vec::new();
    write_message(&mut buffer, &encode(&Request::Ping).unwrap()).await.unwrap();

    let mut cursor = std::io::Cursor::new(buffer);
    let request = read_request(&mut cursor, Duration::from_secs(1)).await.unwrap();
    assert_eq!(request, Request::Ping);
}

#[tokio::test]
async fn garbage_body_is_json_error() {
    let mut buffer = Vec::new();
    write_message(&mut buffer, b"{not json").await.unwrap();

    let mut cursor = std::io::Cursor::new(buffer);
    assert!(matches!(read_request(&mut cursor, Duration::from_secs(1)).await, Err(ProtocolError::Json(_))));
}

#[tokio::test]
async fn silent_peer_times_out() {
    let (mut client, _server) = tokio::io::duplex(64);
    let result = read_request(&mut client, Duration::from_millis(20)).await;
    assert!(matches!(result, Err(ProtocolError::Timeout)));
}
