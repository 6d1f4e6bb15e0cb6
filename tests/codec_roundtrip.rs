mod support;

use anyhow::Result;
use bytes::Bytes;
use http::{Method, Request, Response, StatusCode, Version};
use httpstash::{Error, decode_request, decode_response, encode_request, encode_response};

use support::*;

async fn request_round_trip(req: &Request<Bytes>) -> Result<Request<Bytes>> {
    let mut encoded = Vec::new();
    encode_request(req, &mut encoded).await?;
    let mut input: &[u8] = &encoded;
    Ok(decode_request(&mut input).await?)
}

async fn response_round_trip(res: &Response<Bytes>) -> Result<Response<Bytes>> {
    let mut encoded = Vec::new();
    encode_response(res, &mut encoded).await?;
    let mut input: &[u8] = &encoded;
    Ok(decode_response(&mut input).await?)
}

#[tokio::test]
async fn request_survives_round_trip() -> Result<()> {
    let req = sample_request("example.com", "/foo?a=1&b=2");
    let decoded = request_round_trip(&req).await?;

    assert_eq!(decoded.method(), Method::GET);
    assert_eq!(decoded.uri().path(), "/foo");
    assert_eq!(decoded.uri().query(), Some("a=1&b=2"));
    assert_eq!(decoded.version(), Version::HTTP_11);
    assert_eq!(decoded.headers()["host"], "example.com");
    assert_eq!(decoded.headers()["accept"], "*/*");
    assert_eq!(decoded.headers()["content-type"], "text/plain");
    assert_eq!(decoded.body(), req.body());
    Ok(())
}

#[tokio::test]
async fn response_survives_round_trip() -> Result<()> {
    let res = sample_response("hello world");
    let decoded = response_round_trip(&res).await?;

    assert_eq!(decoded.status(), StatusCode::OK);
    assert_eq!(decoded.headers()["content-type"], "text/plain");
    assert_eq!(decoded.headers()["cache-control"], "max-age=60");
    assert_eq!(decoded.body(), res.body());
    Ok(())
}

#[tokio::test]
async fn binary_body_is_byte_exact() -> Result<()> {
    let body = binary_body();
    let res = Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "image/png")
        .body(body.clone())
        .expect("build response");
    let decoded = response_round_trip(&res).await?;
    assert_eq!(decoded.body(), &body);

    let req = Request::builder()
        .method("PUT")
        .uri("http://example.com/upload")
        .header("host", "example.com")
        .body(body.clone())
        .expect("build request");
    let decoded = request_round_trip(&req).await?;
    assert_eq!(decoded.body(), &body);
    Ok(())
}

#[tokio::test]
async fn header_set_is_preserved() -> Result<()> {
    let res = Response::builder()
        .status(StatusCode::OK)
        .header("set-cookie", "a=1")
        .header("set-cookie", "b=2")
        .header("x-frame-options", "DENY")
        .body(Bytes::from_static(b"x"))
        .expect("build response");
    let decoded = response_round_trip(&res).await?;

    let cookies: Vec<_> = decoded.headers().get_all("set-cookie").iter().collect();
    assert_eq!(cookies, ["a=1", "b=2"]);
    assert_eq!(decoded.headers()["x-frame-options"], "DENY");
    // content-length is the only header the codec may add.
    assert_eq!(decoded.headers().len(), res.headers().len() + 1);
    assert_eq!(decoded.headers()["content-length"], "1");
    Ok(())
}

#[tokio::test]
async fn empty_body_without_content_length_round_trips_header_set() -> Result<()> {
    let req = Request::builder()
        .method("GET")
        .uri("/bare")
        .header("host", "example.com")
        .body(Bytes::new())
        .expect("build request");
    let decoded = request_round_trip(&req).await?;
    assert!(decoded.body().is_empty());
    assert_eq!(decoded.headers().len(), req.headers().len());
    Ok(())
}

#[tokio::test]
async fn chunked_message_from_other_tooling_is_readable() -> Result<()> {
    let mut input: &[u8] = b"HTTP/1.1 200 OK\r\n\
        content-type: text/plain\r\n\
        transfer-encoding: chunked\r\n\r\n\
        4\r\nwiki\r\n5\r\npedia\r\n0\r\n\r\n";
    let res = decode_response(&mut input).await?;
    assert_eq!(&res.body()[..], b"wikipedia");
    Ok(())
}

#[tokio::test]
async fn malformed_messages_are_invalid_not_io() {
    let cases: &[&[u8]] = &[
        b"",
        b"garbage\r\n\r\n",
        b"HTTP/1.1 notanumber OK\r\n\r\n",
        b"HTTP/1.1 200 OK\r\nbroken header\r\n\r\n",
        b"HTTP/1.1 200 OK\r\ncontent-length: 10\r\n\r\nshort",
        b"HTTP/1.1 200 OK\r\ntransfer-encoding: chunked\r\n\r\nzz\r\n",
    ];
    for case in cases {
        let mut input: &[u8] = case;
        let err = decode_response(&mut input).await.expect_err("must fail");
        assert!(
            matches!(err, Error::InvalidMessage(_)),
            "case {case:?} produced {err:?}"
        );
    }
}
