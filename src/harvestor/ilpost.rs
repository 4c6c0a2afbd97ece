use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{
  cookie::{CookieStore, Jar},
  header, Url,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::{
  catalog::CatalogEntry,
  credentials::Credentials,
  podcast::{Episode, Podcast},
  util::parse_italian_date,
  Error, Result,
};

use super::Harvestor;

pub const DEFAULT_BASE_URL: &str = "https://www.ilpost.it/";

const USER_AGENT: &str =
  "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/113.0";

const LOGGED_IN_COOKIE: &str = "wordpress_logged_in";

// A logged-in session against the Il Post WordPress site. All requests share
// the session's cookie jar.
pub struct IlPost {
  client: reqwest::Client,
  base_url: Url,
}

impl IlPost {
  pub async fn login(
    base_url: &str,
    credentials: &Credentials,
  ) -> Result<Self> {
    let base_url = parse_base_url(base_url)?;
    let jar = Arc::new(Jar::default());
    // wp-login.php rejects logins from clients that don't hold the test cookie
    jar.add_cookie_str(
      "wordpress_test_cookie=WP%20Cookie%20check; Path=/",
      &base_url,
    );

    let client = reqwest::Client::builder()
      .cookie_provider(jar.clone())
      .user_agent(USER_AGENT)
      .build()?;

    let login_url = join(&base_url, "wp-login.php")?;
    let resp = client
      .post(login_url)
      .form(&[
        ("log", credentials.username.as_str()),
        ("pwd", credentials.password.expose()),
        ("wp-submit", "Log In"),
        ("redirect_to", base_url.as_str()),
        ("testcookie", "1"),
      ])
      .send()
      .await?;

    let logged_in = jar
      .cookies(&base_url)
      .and_then(|v| v.to_str().map(|s| s.contains(LOGGED_IN_COOKIE)).ok())
      .unwrap_or(false);

    if !logged_in {
      let body = resp.text().await?;
      return Err(Error::Login(login_error_message(&body)));
    }

    info!(site = %base_url, "logged in");
    Ok(Self { client, base_url })
  }

  async fn fetch(&self, entry: &CatalogEntry) -> Result<PodcastData> {
    let ajax_url = join(&self.base_url, "wp-admin/admin-ajax.php")?;
    let referer = self.podcast_url(&entry.slug)?;
    let podcast_id = entry.podcast_id.to_string();

    let resp = self
      .client
      .post(ajax_url)
      .header(header::ACCEPT, "application/json, text/javascript, */*; q=0.01")
      .header(header::ACCEPT_LANGUAGE, "en-US,en;q=0.5")
      .header(header::ORIGIN, self.base_url.origin().ascii_serialization())
      .header(header::REFERER, referer.as_str())
      .header("X-Requested-With", "XMLHttpRequest")
      .form(&[
        ("action", "checkpodcast"),
        ("post_id", "0"),
        ("podcast_id", podcast_id.as_str()),
      ])
      .send()
      .await?
      .error_for_status()?
      .json::<AjaxResponse>()
      .await?;

    Ok(resp.data)
  }

  fn podcast_url(&self, slug: &str) -> Result<Url> {
    join(&self.base_url, &format!("podcasts/{slug}"))
  }
}

#[async_trait]
impl Harvestor for IlPost {
  async fn harvest(&self, entry: &CatalogEntry) -> Result<Podcast> {
    let data = self.fetch(entry).await?;
    if data.msg != "OK" {
      return Err(Error::Ajax {
        podcast: entry.slug.clone(),
        msg: data.msg,
      });
    }

    let episodes = data
      .postcast_list
      .into_iter()
      .map(AjaxEpisode::into_episode)
      .collect::<Result<Vec<_>>>()?;

    debug!(podcast = %entry.slug, episodes = episodes.len(), "fetched podcast");

    Ok(Podcast {
      title: entry.title.clone(),
      description: entry.description.clone(),
      language: "it".to_owned(),
      author: entry.author.clone(),
      logo_url: entry.image.clone(),
      channel_url: self.podcast_url(&entry.slug)?.to_string(),
      episodes,
    })
  }
}

#[derive(Debug, Deserialize)]
struct AjaxResponse {
  data: PodcastData,
}

#[derive(Debug, Deserialize)]
struct PodcastData {
  msg: String,
  #[serde(rename = "postcastList", default)]
  postcast_list: Vec<AjaxEpisode>,
}

#[derive(Debug, Deserialize)]
struct AjaxEpisode {
  title: String,
  podcast_raw_url: String,
  #[serde(default)]
  url: String,
  #[serde(default)]
  date: String,
  #[serde(default)]
  id: Value,
  #[serde(default)]
  minutes: Value,
  #[serde(default)]
  timestamp: Value,
  #[serde(default)]
  description: Value,
  #[serde(default)]
  content: Value,
  #[serde(default)]
  image: Value,
}

impl AjaxEpisode {
  fn into_episode(self) -> Result<Episode> {
    let pub_date = parse_italian_date(&self.date)
      .or_else(|| number(&self.timestamp).and_then(timestamp_to_date))
      .ok_or_else(|| {
        Error::InvalidDate(self.date.clone(), self.title.clone())
      })?;

    let duration = number(&self.minutes)
      .map(|m| (m * 60.0).round().max(0.0) as u64)
      .unwrap_or_default();

    let description = [&self.description, &self.content]
      .into_iter()
      .filter_map(text)
      .find(|s| !s.trim().is_empty())
      .unwrap_or_default();

    Ok(Episode {
      title: self.title,
      link: self.url,
      description,
      pub_date,
      guid: text(&self.id).unwrap_or_default(),
      duration,
      image: text(&self.image).unwrap_or_default(),
      audio_url: self.podcast_raw_url,
    })
  }
}

fn number(v: &Value) -> Option<f64> {
  match v {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => s.trim().parse().ok(),
    _ => None,
  }
}

fn text(v: &Value) -> Option<String> {
  match v {
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

// the API has served both seconds and milliseconds
fn timestamp_to_date(ts: f64) -> Option<DateTime<Utc>> {
  let secs = if ts > 1e11 { ts / 1000.0 } else { ts };
  Utc.timestamp_opt(secs as i64, 0).single()
}

fn parse_base_url(base_url: &str) -> Result<Url> {
  let mut base_url = base_url.to_owned();
  if !base_url.ends_with('/') {
    base_url.push('/');
  }

  Url::parse(&base_url)
    .map_err(|e| Error::Config(format!("invalid base url {base_url:?}: {e}")))
}

fn join(base_url: &Url, path: &str) -> Result<Url> {
  base_url
    .join(path)
    .map_err(|e| Error::Config(format!("invalid path {path:?}: {e}")))
}

fn login_error_message(body: &str) -> String {
  const FALLBACK: &str = "no session cookie after login";

  let Ok(dom) = tl::parse(body, tl::ParserOptions::default()) else {
    return FALLBACK.to_owned();
  };

  dom
    .query_selector("#login_error")
    .expect("selector is hard-coded, thus must be valid")
    .next()
    .and_then(|handle| handle.get(dom.parser()))
    .map(|node| {
      node
        .inner_text(dom.parser())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
    })
    .filter(|msg| !msg.is_empty())
    .unwrap_or_else(|| FALLBACK.to_owned())
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use axum::{
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    routing::post,
    Form, Json, Router,
  };
  use serde_json::json;

  use super::*;
  use crate::catalog::Catalog;

  const LOGIN_ERROR_PAGE: &str = r#"<html><body>
    <div id="login_error">
      <strong>Errore</strong>: la password inserita non è corretta.
    </div>
  </body></html>"#;

  async fn wp_login(
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
  ) -> Response {
    let has_test_cookie = headers
      .get(header::COOKIE)
      .and_then(|v| v.to_str().ok())
      .is_some_and(|v| v.contains("wordpress_test_cookie"));

    let valid = form.get("log").map(String::as_str) == Some("reader")
      && form.get("pwd").map(String::as_str) == Some("secret")
      && form.get("testcookie").map(String::as_str) == Some("1");

    if has_test_cookie && valid {
      (
        [(header::SET_COOKIE, "wordpress_logged_in_abc=reader%7C1; Path=/")],
        "<html>welcome</html>",
      )
        .into_response()
    } else {
      LOGIN_ERROR_PAGE.into_response()
    }
  }

  async fn admin_ajax(
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
  ) -> Json<Value> {
    let logged_in = headers
      .get(header::COOKIE)
      .and_then(|v| v.to_str().ok())
      .is_some_and(|v| v.contains(LOGGED_IN_COOKIE));

    let action = form.get("action").map(String::as_str);
    if !logged_in || action != Some("checkpodcast") {
      return Json(json!({ "data": { "msg": "KO" } }));
    }

    match form.get("podcast_id").map(String::as_str) {
      Some("227474") => Json(json!({
        "data": {
          "msg": "OK",
          "subscriber": true,
          "postcastList": [
            {
              "id": 1001,
              "title": "Il governo e le banche",
              "date": "15 Ott 2024 07:00:00",
              "minutes": 21,
              "podcast_raw_url": "https://static.ilpost.it/morning-1001.mp3",
              "url": "https://www.ilpost.it/episodes/morning-1001/"
            },
            {
              "id": 1000,
              "title": "Le elezioni in Liguria",
              "date": "non una data",
              "timestamp": 1728885600,
              "minutes": "18",
              "content": "<p>La rassegna di oggi.</p>",
              "podcast_raw_url": "https://static.ilpost.it/morning-1000.mp3",
              "url": "https://www.ilpost.it/episodes/morning-1000/"
            }
          ]
        }
      })),
      _ => Json(json!({ "data": { "msg": "Podcast non disponibile" } })),
    }
  }

  async fn spawn_site() -> String {
    let app = Router::new()
      .route("/wp-login.php", post(wp_login))
      .route("/wp-admin/admin-ajax.php", post(admin_ajax));

    let server = axum::Server::bind(&"127.0.0.1:0".parse().unwrap())
      .serve(app.into_make_service());
    let addr = server.local_addr();
    tokio::spawn(server);

    format!("http://{addr}")
  }

  #[tokio::test]
  async fn test_harvest_morning() {
    let site = spawn_site().await;
    let creds = Credentials::new("reader", "secret");
    let ilpost = IlPost::login(&site, &creds).await.unwrap();

    let catalog = Catalog::builtin();
    let entry = catalog.get("morning").unwrap();
    let podcast = ilpost.harvest(entry).await.unwrap();

    assert_eq!(podcast.title, "Morning");
    assert_eq!(podcast.author, "Francesco Costa");
    assert_eq!(podcast.channel_url, format!("{site}/podcasts/morning"));
    assert_eq!(podcast.episodes.len(), 2);

    let first = &podcast.episodes[0];
    assert_eq!(first.guid, "1001");
    assert_eq!(first.duration, 21 * 60);
    assert_eq!(
      first.pub_date,
      Utc.with_ymd_and_hms(2024, 10, 15, 7, 0, 0).unwrap()
    );
    assert!(first.description.is_empty());

    let second = &podcast.episodes[1];
    assert_eq!(second.duration, 18 * 60);
    assert_eq!(second.pub_date, Utc.timestamp_opt(1728885600, 0).unwrap());
    assert_eq!(second.description, "<p>La rassegna di oggi.</p>");
  }

  #[tokio::test]
  async fn test_ajax_error_message() {
    let site = spawn_site().await;
    let creds = Credentials::new("reader", "secret");
    let ilpost = IlPost::login(&site, &creds).await.unwrap();

    let catalog = Catalog::builtin();
    let err = ilpost
      .harvest(catalog.get("politics").unwrap())
      .await
      .unwrap_err();

    assert!(matches!(
      err,
      Error::Ajax { ref podcast, ref msg }
        if podcast == "politics" && msg == "Podcast non disponibile"
    ));
  }

  #[tokio::test]
  async fn test_login_rejected() {
    let site = spawn_site().await;
    let creds = Credentials::new("reader", "wrong");

    let err = IlPost::login(&site, &creds).await.err().unwrap();
    let msg = err.to_string();

    assert!(matches!(err, Error::Login(_)));
    assert!(msg.contains("la password inserita non è corretta"));
    assert!(!msg.contains("wrong"));
  }

  #[test]
  fn test_login_error_fallback() {
    assert_eq!(
      login_error_message("<html><body>hello</body></html>"),
      "no session cookie after login"
    );
  }

  #[test]
  fn test_invalid_date_without_timestamp() {
    let episode: AjaxEpisode = serde_json::from_value(json!({
      "title": "Senza data",
      "date": "presto",
      "podcast_raw_url": "https://static.ilpost.it/x.mp3"
    }))
    .unwrap();

    let err = episode.into_episode().unwrap_err();
    assert!(matches!(err, Error::InvalidDate(date, title)
      if date == "presto" && title == "Senza data"));
  }
}
