//! Request handlers.
//!
//! A [`Handler`] turns one parsed [`Request`] into a [`Response`]. Closures are
//! adapted with [`make_handler`]:
//!
//! ```
//! use std::convert::Infallible;
//! use h1_wire::handler::make_handler;
//! use h1_wire::protocol::{Request, Response, Status};
//!
//! let handler = make_handler(|request: Request| {
//!     let body = format!("you asked for {}", request.url().path());
//!     Ok::<_, Infallible>(Response::new(Status::from_code(200)).with_body(body))
//! });
//! # let _ = handler;
//! ```

use std::error::Error;

use crate::protocol::{Request, Response};

pub trait Handler {
    type Error: Into<Box<dyn Error + Send + Sync>>;

    fn call(&self, request: Request) -> Result<Response, Self::Error>;
}

#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

impl<F, Err> Handler for HandlerFn<F>
where
    F: Fn(Request) -> Result<Response, Err>,
    Err: Into<Box<dyn Error + Send + Sync>>,
{
    type Error = Err;

    fn call(&self, request: Request) -> Result<Response, Self::Error> {
        (self.f)(request)
    }
}

pub fn make_handler<F, Err>(f: F) -> HandlerFn<F>
where
    F: Fn(Request) -> Result<Response, Err>,
    Err: Into<Box<dyn Error + Send + Sync>>,
{
    HandlerFn { f }
}

impl<H: Handler + ?Sized> Handler for &H {
    type Error = H::Error;

    fn call(&self, request: Request) -> Result<Response, Self::Error> {
        (**self).call(request)
    }
}
