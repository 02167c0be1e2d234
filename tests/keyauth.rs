use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;

use reqgate::endpoint::WebResponse;
use reqgate::extractors::{
    chain, from_auth_header, from_cookie, from_form, from_header, from_param, from_query, Extractor, Source,
};
use reqgate::frontends::simple::{Error, Request, Response};
use reqgate::keyauth::{token_from_context, Config, KeyAuth, KeyAuthError, Next};

fn ok(request: &mut Request) -> Result<Response, Error> {
    let mut response = Response::default();
    response.body_text(&format!("ok {}", token_from_context(request)))?;
    Ok(response)
}

fn run(gate: &KeyAuth<Request>, mut request: Request) -> Response {
    gate.handle(&mut request, Next::new(ok)).unwrap()
}

#[test]
fn custom_header() {
    let gate = KeyAuth::new(
        Config::new()
            .extractor(from_header("X-Api-Key"))
            .validator(|_: &Request, key: &str| Ok(key == "SECRET")),
    )
    .unwrap();

    let accepted = run(&gate, Request::new().with_header("X-Api-Key", "SECRET"));
    assert_eq!(accepted.status, 200);
    assert_eq!(accepted.text(), Some("ok SECRET"));
    assert_eq!(accepted.header("WWW-Authenticate"), None);

    let missing = run(&gate, Request::new());
    assert_eq!(missing.status, 401);
    assert_eq!(missing.text(), Some("missing or invalid API Key"));
    assert_eq!(missing.header("WWW-Authenticate"), Some(r#"ApiKey realm="Restricted""#));
}

#[test]
fn bearer_with_insufficient_scope() {
    let gate = KeyAuth::new(
        Config::new()
            .extractor(from_auth_header("Authorization", "Bearer"))
            .realm("api")
            .error("insufficient_scope")
            .scope("read write")
            .validator(|_: &Request, _: &str| Ok(false)),
    )
    .unwrap();

    let response = run(&gate, Request::new().with_header("Authorization", "Bearer x"));
    assert_eq!(response.status, 401);
    assert_eq!(
        response.header("WWW-Authenticate"),
        Some(r#"Bearer realm="api", error="insufficient_scope", scope="read write""#)
    );
}

#[test]
fn non_bearer_schemes_carry_no_error() {
    let gate = KeyAuth::new(
        Config::new()
            .extractor(from_auth_header("Authorization", "ApiKey"))
            .error("invalid_token")
            .validator(|_: &Request, _: &str| Ok(false)),
    )
    .unwrap();

    let response = run(&gate, Request::new());
    assert_eq!(response.header("WWW-Authenticate"), Some(r#"ApiKey realm="Restricted""#));
}

#[test]
fn chained_extractors_prefer_the_first() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&seen);
    let gate = KeyAuth::new(
        Config::new()
            .extractor(chain(vec![from_header("X-Api-Key"), from_query("api_key")]))
            .validator(move |_: &Request, key: &str| {
                record.lock().unwrap().push(key.to_owned());
                Ok(true)
            }),
    )
    .unwrap();

    run(&gate, Request::new().with_header("X-Api-Key", "h").with_query("api_key=q"));
    run(&gate, Request::new().with_query("api_key=q"));
    assert_eq!(*seen.lock().unwrap(), ["h", "q"]);
}

#[test]
fn chain_announces_every_scheme() {
    let gate = KeyAuth::new(
        Config::new()
            .extractor(chain(vec![
                from_auth_header("Authorization", "Bearer"),
                chain(vec![from_cookie("key"), from_auth_header("Authorization", "ApiKey")]),
            ]))
            .validator(|_: &Request, _: &str| Ok(false)),
    )
    .unwrap();

    let response = run(&gate, Request::new());
    assert_eq!(
        response.header("WWW-Authenticate"),
        Some(r#"Bearer realm="Restricted", ApiKey realm="Restricted""#)
    );
}

#[test]
fn extractor_sources() {
    let gate = |extractor: Extractor<Request>| {
        KeyAuth::new(
            Config::new()
                .extractor(extractor)
                .validator(|_: &Request, key: &str| Ok(key == "k")),
        )
        .unwrap()
    };

    let cookie = run(&gate(from_cookie("key")), Request::new().with_cookie_header("key=k"));
    assert_eq!(cookie.status, 200);

    let param = run(&gate(from_param("key")), Request::new().with_param("key", "k"));
    assert_eq!(param.status, 200);

    let form = run(&gate(from_form("key")), Request::new().with_urlbody("key=k"));
    assert_eq!(form.status, 200);

    let empty = run(&gate(from_query("key")), Request::new().with_query("key="));
    assert_eq!(empty.status, 401);

    assert_eq!(from_param::<Request>("key").source(), Source::Param);
}

#[test]
fn no_challenge_outside_401_and_407() {
    let forbidding = |status: u16| {
        KeyAuth::new(
            Config::new()
                .extractor(from_header("X-Api-Key"))
                .validator(|_: &Request, _: &str| Ok(false))
                .error_handler(move |_: &mut Request, _: KeyAuthError| {
                    let mut response = Response::default();
                    response.set_status(status)?;
                    Ok(response)
                }),
        )
        .unwrap()
    };

    let forbidden = run(&forbidding(403), Request::new());
    assert_eq!(forbidden.status, 403);
    assert_eq!(forbidden.headers().count(), 0);

    let proxy = run(&forbidding(407), Request::new());
    assert_eq!(proxy.header("Proxy-Authenticate"), Some(r#"ApiKey realm="Restricted""#));
    assert_eq!(proxy.header("WWW-Authenticate"), None);
}

#[test]
fn error_handler_errors_propagate() {
    let gate = KeyAuth::new(
        Config::new()
            .validator(|_: &Request, _: &str| Ok(false))
            .error_handler(|_: &mut Request, _: KeyAuthError| Err(Error::InvalidStatus(0))),
    )
    .unwrap();

    let mut request = Request::new();
    let err = gate.handle(&mut request, Next::new(ok)).unwrap_err();
    assert_eq!(err, Error::InvalidStatus(0));
}

#[test]
fn explicit_challenge_without_schemes() {
    let gate = KeyAuth::new(
        Config::new()
            .extractor(from_query("key"))
            .challenge(r#"Custom realm="elsewhere""#)
            .validator(|_: &Request, _: &str| Ok(false)),
    )
    .unwrap();

    let response = run(&gate, Request::new());
    assert_eq!(response.header("WWW-Authenticate"), Some(r#"Custom realm="elsewhere""#));
}
