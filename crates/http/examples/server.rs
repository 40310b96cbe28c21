use std::convert::Infallible;
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;

use h1_wire::connection::HttpConnection;
use h1_wire::handler::{HandlerFn, make_handler};
use h1_wire::protocol::{Body, Request, Response, Status};
use h1_wire::stream::{Deadline, MemoryStream, OutputStream, TcpStream};
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!(port = 8080, "start listening");
    let listener = match TcpListener::bind("127.0.0.1:8080") {
        Ok(listener) => listener,
        Err(e) => {
            error!(cause = %e, "bind server error");
            return;
        }
    };

    let handler = Arc::new(make_handler(route));
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                warn!(cause = %e, "failed to accept");
                continue;
            }
        };

        let handler = Arc::clone(&handler);
        thread::spawn(move || serve(stream, &handler));
    }
}

fn serve<F>(stream: std::net::TcpStream, handler: &HandlerFn<F>)
where
    F: Fn(Request) -> Result<Response, Infallible>,
{
    let stream = TcpStream::from_std(stream);
    let peer = stream.peer_addr().ok();
    match HttpConnection::new(stream).process(handler) {
        Ok(()) => info!(?peer, "finished process, connection shutdown"),
        Err(e) => error!(?peer, "service has error, cause {}, connection shutdown", e),
    }
}

fn route(request: Request) -> Result<Response, Infallible> {
    let path = request.url().path().to_owned();
    info!(method = %request.method(), %path, "request");

    let response = match path.as_str() {
        "/" => Response::new(Status::from_code(200)).with_body("Hello World!\r\n"),

        // body pulled from a reader and sent chunked
        "/reader" => {
            let reader = MemoryStream::from_chunks(["streamed ", "from ", "a reader\r\n"]);
            Response::new(Status::from_code(200)).with_body(Body::reader(reader))
        }

        // body pushed by a callback and sent chunked
        "/writer" => Response::new(Status::from_code(200)).with_body(Body::writer(|out| {
            for i in 0..5 {
                out.write(format!("line {i}\r\n").as_bytes(), Deadline::never())?;
            }
            Ok(())
        })),

        "/echo" => {
            let body = request.into_body();
            Response::new(Status::from_code(200)).with_header("Content-Type", "application/octet-stream").with_body(body)
        }

        _ => Response::new(Status::from_code(404)).with_body("Not Found\r\n"),
    };

    Ok(response)
}
