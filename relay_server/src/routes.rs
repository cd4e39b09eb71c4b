//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Handlers are async functions so that outbound I/O (ledger, marketplace, sink) never blocks a worker thread.
use actix_web::{get, head, web, HttpResponse, Responder};
use log::*;
use meli_tools::MeliApi;
use serde_json::json;

use crate::errors::ServerError;

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/healthz")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().json(json!({"ok": true}))
}

#[get("/")]
pub async fn index() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "ok": true,
        "service": "meli-sales-relay",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[head("/")]
pub async fn head_index() -> impl Responder {
    HttpResponse::Ok().finish()
}

// ----------------------------------------------   Sales  ----------------------------------------------------
/// A read-through proxy over the marketplace's order search: the most recent paid orders for the configured seller.
/// Holds no state; every call goes straight to the marketplace.
#[get("/sales")]
pub async fn sales(api: web::Data<MeliApi>) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET recent sales");
    let sales = api.recent_paid_sales(50).await.map_err(|e| {
        warn!("💻️ Could not fetch the sales listing. {e}");
        ServerError::BackendError(e.to_string())
    })?;
    Ok(HttpResponse::Ok().json(sales))
}
