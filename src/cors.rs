use rocket::{
    fairing::{Fairing, Info, Kind},
    http::{Header, Status},
    Build, Request, Response, Rocket,
};

const ALLOW_METHODS: &str = "GET, POST, DELETE, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type";
const MAX_AGE_SECS: u32 = 60 * 60;

/// Answer any `OPTIONS` preflight with an empty success; the headers are added
/// by [`CorsFairing`] like on every other response.
#[options("/<_..>")]
fn preflight() -> Status {
    Status::NoContent
}

/// A fairing that lets browsers on any origin call the API: it mounts a
/// catch-all preflight route and adds the CORS headers to every response,
/// errors included.
#[derive(Debug, Copy, Clone)]
pub struct CorsFairing;

#[rocket::async_trait]
impl Fairing for CorsFairing {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Ignite | Kind::Response,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        Ok(rocket.mount("/", routes![preflight]))
    }

    async fn on_response<'r>(&self, _req: &'r Request<'_>, res: &mut Response<'r>) {
        res.set_header(Header::new("Access-Control-Allow-Origin", "*"));
        res.set_header(Header::new("Access-Control-Allow-Methods", ALLOW_METHODS));
        res.set_header(Header::new("Access-Control-Allow-Headers", ALLOW_HEADERS));
        res.set_header(Header::new(
            "Access-Control-Max-Age",
            MAX_AGE_SECS.to_string(),
        ));
    }
}
