use std::convert::Infallible;
use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use h1_wire::codec::{Parser, ResponseSerializer};
use h1_wire::connection::HttpConnection;
use h1_wire::handler::make_handler;
use h1_wire::protocol::{Body, Request, Response, Status};
use h1_wire::stream::{Deadline, MemoryStream};

const SIMPLE_REQUEST: &[u8] = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";

const BROWSER_REQUEST: &[u8] = b"GET /index/?a=1&b=2&a=3 HTTP/1.1\r\n\
Host: 127.0.0.1:8080\r\n\
Connection: keep-alive\r\n\
Cache-Control: max-age=0\r\n\
sec-ch-ua: \"#Not_A Brand\";v=\"99\", \"Microsoft Edge\";v=\"109\", \"Chromium\";v=\"109\"\r\n\
sec-ch-ua-mobile: ?0\r\n\
sec-ch-ua-platform: \"macOS\"\r\n\
Upgrade-Insecure-Requests: 1\r\n\
User-Agent: Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/109.0.0.0 Safari/537.36 Edg/109.0.1518.52\r\n\
Accept: text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8\r\n\
Sec-Fetch-Site: none\r\n\
Sec-Fetch-Mode: navigate\r\n\
Accept-Encoding: gzip, deflate, br\r\n\
Accept-Language: zh-CN,zh;q=0.9,en;q=0.8,en-GB;q=0.7,en-US;q=0.6\r\n\r\n";

fn hello_world(_request: Request) -> Result<Response, Infallible> {
    Ok(Response::new(Status::from_code(200)).with_body("Hello World!"))
}

fn bench_parser(c: &mut Criterion) {
    c.bench_function("parse_simple_request", |b| {
        b.iter(|| {
            let mut parser = Parser::request();
            black_box(parser.parse(SIMPLE_REQUEST).unwrap());
        });
    });

    c.bench_function("parse_browser_request", |b| {
        b.iter(|| {
            let mut parser = Parser::request();
            black_box(parser.parse(BROWSER_REQUEST).unwrap());
        });
    });

    c.bench_function("parse_browser_request_byte_at_a_time", |b| {
        b.iter(|| {
            let mut parser = Parser::request();
            let mut messages = Vec::new();
            for byte in BROWSER_REQUEST.chunks(1) {
                messages.extend(parser.parse(byte).unwrap());
            }
            black_box(messages);
        });
    });
}

fn bench_serializer(c: &mut Criterion) {
    c.bench_function("serialize_simple_response", |b| {
        b.iter(|| {
            let response = Response::new(Status::from_code(200)).with_header("Content-Length", "12").with_body("Hello World!");
            let mut serializer = ResponseSerializer::new(MemoryStream::new());
            serializer.serialize(response, Deadline::never()).unwrap();
            black_box(serializer.into_inner());
        });
    });

    let payload = vec![b'x'; 64 * 1024];
    c.bench_function("serialize_chunked_reader_body", |b| {
        b.iter(|| {
            let reader = MemoryStream::from_chunks([payload.clone()]);
            let response = Response::new(Status::from_code(200))
                .with_header("Transfer-Encoding", "chunked")
                .with_body(Body::reader(reader));
            let mut serializer = ResponseSerializer::new(MemoryStream::new());
            serializer.serialize(response, Deadline::never()).unwrap();
            black_box(serializer.into_inner());
        });
    });
}

fn bench_http_connection(c: &mut Criterion) {
    let handler = make_handler(hello_world);

    c.bench_function("process_simple_request", |b| {
        b.iter(|| {
            let mut stream = MemoryStream::from_chunks([SIMPLE_REQUEST]);
            HttpConnection::new(&mut stream).process(&handler).unwrap();
            black_box(stream);
        });
    });
}

criterion_group!(benches, bench_parser, bench_serializer, bench_http_connection);
criterion_main!(benches);
