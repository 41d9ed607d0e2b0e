use serde::Deserialize;
use std::sync::mpsc::{self, Receiver};

use crate::settings::Settings;
use crate::workout::Coords;

#[derive(Debug)]
pub enum GeolocationError {
    /// The lookup service refused to locate us.
    Denied(String),
    /// The service answered with something that is not a position.
    Unavailable(String),
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl std::fmt::Display for GeolocationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeolocationError::Denied(msg) => write!(f, "Location denied: {msg}"),
            GeolocationError::Unavailable(msg) => write!(f, "Location unavailable: {msg}"),
            GeolocationError::Other(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for GeolocationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GeolocationError::Denied(_) | GeolocationError::Unavailable(_) => None,
            GeolocationError::Other(e) => Some(&**e),
        }
    }
}

#[derive(Deserialize)]
struct LookupResponse {
    status: Option<String>,
    message: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

fn lookup_with_url(url: &str) -> Result<Coords, GeolocationError> {
    let response = ureq::get(url)
        .set("User-Agent", "mapty")
        .set("Accept", "application/json")
        .call();
    let body = match response {
        Ok(r) => r
            .into_string()
            .map_err(|e| GeolocationError::Other(Box::new(e)))?,
        Err(ureq::Error::Status(code @ (401 | 403), r)) => {
            let body = r.into_string().unwrap_or_default();
            return Err(GeolocationError::Denied(format!("{code} {body}")));
        }
        Err(e) => return Err(GeolocationError::Other(Box::new(e))),
    };
    let parsed: LookupResponse =
        serde_json::from_str(&body).map_err(|e| GeolocationError::Other(Box::new(e)))?;
    if parsed.status.as_deref() == Some("fail") {
        let msg = parsed.message.unwrap_or_else(|| "lookup failed".into());
        return Err(GeolocationError::Denied(msg));
    }
    match (parsed.lat, parsed.lon) {
        (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Ok(Coords::new(lat, lon)),
        _ => Err(GeolocationError::Unavailable("response has no coordinates".into())),
    }
}

/// Resolve the map centre: a configured location if there is one, otherwise
/// a network lookup.
pub fn locate(settings: &Settings) -> Result<Coords, GeolocationError> {
    if let Some(coords) = settings.fixed_location() {
        log::info!("Using configured location {}, {}", coords.lat, coords.lng);
        return Ok(coords);
    }
    log::info!("Looking up location via {}", settings.geolocation_url);
    lookup_with_url(&settings.geolocation_url)
}

/// Run [`locate`] off the UI thread; the result arrives on the receiver.
pub fn spawn_locate(settings: &Settings) -> Receiver<Result<Coords, GeolocationError>> {
    let (tx, rx) = mpsc::channel();
    let settings = settings.clone();
    std::thread::spawn(move || {
        let _ = tx.send(locate(&settings));
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn parses_successful_lookup() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(GET).path("/json");
            then.status(200)
                .body(r#"{"status":"success","lat":38.72,"lon":-9.14,"city":"Lisbon"}"#);
        });

        let coords = lookup_with_url(&server.url("/json")).unwrap();
        assert_eq!(coords, Coords::new(38.72, -9.14));
        m.assert();
    }

    #[test]
    fn failed_status_is_denied() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/json");
            then.status(200)
                .body(r#"{"status":"fail","message":"private range"}"#);
        });

        match lookup_with_url(&server.url("/json")).unwrap_err() {
            GeolocationError::Denied(msg) => assert_eq!(msg, "private range"),
            e => panic!("unexpected error: {e:?}"),
        }
    }

    #[test]
    fn forbidden_is_denied() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/json");
            then.status(403).body("no");
        });

        assert!(matches!(
            lookup_with_url(&server.url("/json")),
            Err(GeolocationError::Denied(_))
        ));
    }

    #[test]
    fn missing_coordinates_are_unavailable() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/json");
            then.status(200).body(r#"{"status":"success"}"#);
        });

        assert!(matches!(
            lookup_with_url(&server.url("/json")),
            Err(GeolocationError::Unavailable(_))
        ));
    }

    #[test]
    fn configured_location_skips_lookup() {
        let mut settings = Settings::default();
        settings.home_location = Some(Coords::new(1.0, 2.0));
        settings.geolocation_url = "http://127.0.0.1:1/unreachable".into();
        let rx = spawn_locate(&settings);
        assert!(rx.recv().unwrap().is_ok());
    }
}
