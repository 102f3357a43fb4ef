use std::sync::Arc;

use cookie::Cookie;
use log::error;
use warp::http::{header, HeaderValue, StatusCode, Uri};
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use crate::auth::{Credentials, SessionId};
use crate::cardio::{self, CardioRisk, RegisterError, Session};
use crate::views;

const SESSION_COOKIE: &str = "sessionid";
const FLASH_COOKIE: &str = "flash";
const MAX_BODY: u64 = 16 * 1024;

/// One-shot messages shown on the login page after a redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flash {
    Registered,
    Exists,
    Incomplete,
    LoggedOut,
}

impl Flash {
    fn code(&self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Exists => "exists",
            Self::Incomplete => "incomplete",
            Self::LoggedOut => "logged-out",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        [
            Self::Registered,
            Self::Exists,
            Self::Incomplete,
            Self::LoggedOut,
        ]
        .into_iter()
        .find(|f| f.code() == code)
    }

    fn message(&self) -> &'static str {
        match self {
            Self::Registered => "Registration successful! Please log in.",
            Self::Exists => "Username already exists.",
            Self::Incomplete => "Username and password are required.",
            Self::LoggedOut => "You have been logged out.",
        }
    }
}

const INVALID_CREDENTIALS: &str = "Invalid username or password.";

pub fn routes(
    app: Arc<CardioRisk>,
    secure: bool,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let home = warp::path::end()
        .and(warp::get())
        .and(with_session(app.clone()))
        .map(|session: Session| warp::reply::html(views::home(session.username())).into_response());

    let login_page = warp::path!("login")
        .and(warp::get())
        .and(warp::cookie::optional(FLASH_COOKIE))
        .map(|flash: Option<String>| {
            let flash = flash.as_deref().and_then(Flash::from_code);
            let mut res = warp::reply::html(views::login(flash.map(|f| f.message()))).into_response();
            if flash.is_some() {
                append_cookie(&mut res, removal_cookie(FLASH_COOKIE));
            }
            res
        });

    let login = warp::path!("login")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY))
        .and(warp::body::form())
        .and_then({
            let app = app.clone();
            move |creds: Credentials| {
                let app = app.clone();
                async move {
                    match app.login(&creds).await {
                        Ok(session) => {
                            let mut res = see_other("/");
                            append_cookie(&mut res, session_cookie(session.session_id(), secure));
                            Ok(res)
                        }
                        Err(cardio::Error::Unauthorized) => {
                            Ok(warp::reply::html(views::login(Some(INVALID_CREDENTIALS)))
                                .into_response())
                        }
                        Err(e) => Err(warp::reject::custom(e)),
                    }
                }
            }
        });

    let register = warp::path!("register")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY))
        .and(warp::body::form())
        .and_then({
            let app = app.clone();
            move |creds: Credentials| {
                let app = app.clone();
                async move {
                    let flash = match app.register(&creds).await {
                        Ok(()) => Flash::Registered,
                        Err(RegisterError::Exists) => Flash::Exists,
                        Err(RegisterError::Incomplete) => Flash::Incomplete,
                        Err(RegisterError::Internal) => {
                            return Err(warp::reject::custom(cardio::Error::Internal))
                        }
                    };

                    let mut res = see_other("/login");
                    append_cookie(&mut res, flash_cookie(flash));
                    Ok::<_, Rejection>(res)
                }
            }
        });

    let logout = warp::path!("logout")
        .and(warp::get())
        .and(with_session(app.clone()))
        .and_then(|session: Session| async move {
            session.logout().await.map_err(warp::reject::custom)?;

            let mut res = see_other("/login");
            append_cookie(&mut res, removal_cookie(SESSION_COOKIE));
            append_cookie(&mut res, flash_cookie(Flash::LoggedOut));
            Ok::<_, Rejection>(res)
        });

    let predict = warp::path!("predict")
        .and(warp::post())
        .and(with_session(app.clone()))
        .and(warp::body::content_length_limit(MAX_BODY))
        .and(warp::body::bytes())
        .then(|session: Session, body: warp::hyper::body::Bytes| async move {
            warp::reply::json(&session.predict(&body).await).into_response()
        });

    let view_data = warp::path!("view_data")
        .and(warp::get())
        .and(with_session(app))
        .and_then(|session: Session| async move {
            let rows = session
                .recent_predictions()
                .await
                .map_err(warp::reject::custom)?;

            Ok::<_, Rejection>(warp::reply::json(&rows).into_response())
        });

    home.or(login_page)
        .unify()
        .or(login)
        .unify()
        .or(register)
        .unify()
        .or(logout)
        .unify()
        .or(predict)
        .unify()
        .or(view_data)
        .unify()
        .recover(handle_rejection)
        .with(warp::log("cardiorisk"))
}

/// Resolves the `sessionid` cookie to a logged-in user, or rejects as
/// unauthorized.
fn with_session(
    app: Arc<CardioRisk>,
) -> impl Filter<Extract = (Session,), Error = Rejection> + Clone {
    warp::cookie::optional(SESSION_COOKIE).and_then(move |cookie: Option<String>| {
        let app = app.clone();
        async move {
            let session_id = cookie
                .and_then(|c| c.parse::<SessionId>().ok())
                .ok_or_else(|| warp::reject::custom(cardio::Error::Unauthorized))?;

            app.authenticate(session_id)
                .await
                .map_err(warp::reject::custom)
        }
    })
}

async fn handle_rejection(err: Rejection) -> Result<Response, Rejection> {
    match err.find::<cardio::Error>() {
        Some(cardio::Error::Unauthorized) => Ok(see_other("/login")),
        Some(cardio::Error::Internal) => {
            let status: StatusCode = cardio::Error::Internal.into();
            Ok(warp::reply::with_status("internal error", status).into_response())
        }
        None => Err(err),
    }
}

fn see_other(location: &'static str) -> Response {
    warp::redirect::see_other(Uri::from_static(location)).into_response()
}

fn append_cookie(res: &mut Response, cookie: Cookie<'static>) {
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => {
            res.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => error!("couldn't encode cookie {}: {e:?}", cookie.name()),
    }
}

fn session_cookie(session_id: &SessionId, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session_id.to_string()))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(cookie::SameSite::Lax)
        .build()
}

fn flash_cookie(flash: Flash) -> Cookie<'static> {
    Cookie::build((FLASH_COOKIE, flash.code()))
        .path("/")
        .http_only(true)
        .build()
}

fn removal_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::build((name, "")).path("/").build();
    cookie.make_removal();
    cookie
}

#[cfg(test)]
mod test {
    use super::*;

    use warp::test::request;

    use crate::cardio::test::create_app;
    use crate::features::test::SAMPLE;

    type TestResponse = warp::http::Response<warp::hyper::body::Bytes>;

    fn set_cookies(res: &TestResponse) -> Vec<String> {
        res.headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    fn cookie_value(res: &TestResponse, name: &str) -> Option<String> {
        set_cookies(res).into_iter().find_map(|c| {
            let parsed = Cookie::parse(c).ok()?;
            (parsed.name() == name).then(|| parsed.value().to_string())
        })
    }

    async fn register_and_login<F>(filter: &F) -> String
    where
        F: Filter + 'static,
        F::Extract: Reply + Send,
    {
        let res = request()
            .method("POST")
            .path("/register")
            .header("content-type", "application/x-www-form-urlencoded")
            .body("username=alice&password=pw")
            .reply(filter)
            .await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);

        let res = request()
            .method("POST")
            .path("/login")
            .header("content-type", "application/x-www-form-urlencoded")
            .body("username=alice&password=pw")
            .reply(filter)
            .await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[header::LOCATION], "/");

        cookie_value(&res, SESSION_COOKIE).expect("session cookie")
    }

    #[tokio::test]
    async fn protected_routes_redirect_to_login() {
        let filter = routes(create_app().await, false);

        for (method, path) in [("GET", "/"), ("POST", "/predict"), ("GET", "/view_data")] {
            let res = request().method(method).path(path).reply(&filter).await;

            assert_eq!(res.status(), StatusCode::SEE_OTHER, "{method} {path}");
            assert_eq!(res.headers()[header::LOCATION], "/login");
        }

        let res = request()
            .path("/")
            .header("cookie", format!("{SESSION_COOKIE}={}", SessionId::new()))
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
    }

    #[tokio::test]
    async fn login_gives_a_working_session() {
        let filter = routes(create_app().await, false);
        let session = register_and_login(&filter).await;

        let res = request()
            .path("/")
            .header("cookie", format!("{SESSION_COOKIE}={session}"))
            .reply(&filter)
            .await;

        assert_eq!(res.status(), StatusCode::OK);
        assert!(std::str::from_utf8(res.body())
            .unwrap()
            .contains("Logged in as alice"));
    }

    #[tokio::test]
    async fn bad_login_rerenders_with_generic_message() {
        let filter = routes(create_app().await, false);
        register_and_login(&filter).await;

        for body in ["username=alice&password=wrong", "username=nobody&password=pw"] {
            let res = request()
                .method("POST")
                .path("/login")
                .header("content-type", "application/x-www-form-urlencoded")
                .body(body)
                .reply(&filter)
                .await;

            assert_eq!(res.status(), StatusCode::OK);
            assert!(std::str::from_utf8(res.body())
                .unwrap()
                .contains(INVALID_CREDENTIALS));
            assert_eq!(cookie_value(&res, SESSION_COOKIE), None);
        }
    }

    #[tokio::test]
    async fn duplicate_registration_flashes() {
        let filter = routes(create_app().await, false);
        register_and_login(&filter).await;

        let res = request()
            .method("POST")
            .path("/register")
            .header("content-type", "application/x-www-form-urlencoded")
            .body("username=alice&password=other")
            .reply(&filter)
            .await;

        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[header::LOCATION], "/login");
        let flash = cookie_value(&res, FLASH_COOKIE).unwrap();
        assert_eq!(Flash::from_code(&flash), Some(Flash::Exists));

        let res = request()
            .path("/login")
            .header("cookie", format!("{FLASH_COOKIE}={flash}"))
            .reply(&filter)
            .await;
        assert!(std::str::from_utf8(res.body())
            .unwrap()
            .contains("Username already exists."));
        assert_eq!(cookie_value(&res, FLASH_COOKIE).as_deref(), Some(""));
    }

    #[tokio::test]
    async fn predict_returns_label_json() {
        let filter = routes(create_app().await, false);
        let session = register_and_login(&filter).await;
        let cookie = format!("{SESSION_COOKIE}={session}");

        let res = request()
            .method("POST")
            .path("/predict")
            .header("cookie", &cookie)
            .header("content-type", "application/json")
            .body(SAMPLE)
            .reply(&filter)
            .await;

        assert_eq!(res.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(json, serde_json::json!({ "prediction_text": "High Risk" }));

        let res = request()
            .method("POST")
            .path("/predict")
            .header("cookie", &cookie)
            .body("{\"age\": 63}")
            .reply(&filter)
            .await;

        assert_eq!(res.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
        let text = json["prediction_text"].as_str().unwrap();
        assert!(text.starts_with("Error: "), "{text}");

        let res = request()
            .path("/view_data")
            .header("cookie", &cookie)
            .reply(&filter)
            .await;

        assert_eq!(res.status(), StatusCode::OK);
        let rows: Vec<serde_json::Value> = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][16], "High Risk");
    }

    #[tokio::test]
    async fn logout_ends_the_session() {
        let filter = routes(create_app().await, false);
        let session = register_and_login(&filter).await;
        let cookie = format!("{SESSION_COOKIE}={session}");

        let res = request()
            .path("/logout")
            .header("cookie", &cookie)
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[header::LOCATION], "/login");
        assert_eq!(cookie_value(&res, SESSION_COOKIE).as_deref(), Some(""));

        let res = request().path("/").header("cookie", &cookie).reply(&filter).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
    }

    #[tokio::test]
    async fn secure_flag_reaches_the_cookie() {
        let filter = routes(create_app().await, true);

        request()
            .method("POST")
            .path("/register")
            .header("content-type", "application/x-www-form-urlencoded")
            .body("username=bob&password=pw")
            .reply(&filter)
            .await;
        let res = request()
            .method("POST")
            .path("/login")
            .header("content-type", "application/x-www-form-urlencoded")
            .body("username=bob&password=pw")
            .reply(&filter)
            .await;

        let cookie = set_cookies(&res)
            .into_iter()
            .find(|c| c.starts_with(SESSION_COOKIE))
            .unwrap();
        assert!(cookie.contains("Secure"), "{cookie}");
        assert!(cookie.contains("HttpOnly"), "{cookie}");
    }
}
