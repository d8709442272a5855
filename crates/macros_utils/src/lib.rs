//! Small declarative helpers shared by the HTTP surfaces.

#[cfg(feature = "actix")]
#[doc(hidden)]
pub mod __private {
    pub use actix_web;
}

/// Generate a `routes` configurator registering every listed handler.
///
/// ```ignore
/// macros_utils::routes! {
///     route health_route,
///     route liveness_route,
/// }
///
/// App::new().configure(routes);
/// ```
#[cfg(feature = "actix")]
#[macro_export]
macro_rules! routes {
    ($(route $handler:ident),* $(,)?) => {
        pub fn routes(cfg: &mut $crate::__private::actix_web::web::ServiceConfig) {
            $( cfg.service($handler); )*
        }
    };
}
