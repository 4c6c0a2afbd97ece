use chrono::{DateTime, Utc};
use rss::extension::{ExtensionBuilder, ExtensionMap};

use crate::GENERATOR_STR;

const GOOGLEPLAY_NAMESPACE: &str =
  "http://www.google.com/schemas/play-podcasts/1.0";

#[derive(Debug, Default)]
pub struct Podcast {
  pub title: String,
  pub description: String,
  pub language: String,
  pub author: String,
  pub logo_url: String,
  pub channel_url: String,
  pub episodes: Vec<Episode>,
}

impl Podcast {
  fn last_build_date(&self) -> Option<DateTime<Utc>> {
    self.episodes.iter().map(|e| e.pub_date).max()
  }
}

impl From<Podcast> for rss::Channel {
  fn from(podcast: Podcast) -> Self {
    let last_build_date = podcast.last_build_date().map(|d| d.to_rfc2822());

    // the feeds are private to the subscriber, keep directories away
    let itunes_ext =
      rss::extension::itunes::ITunesChannelExtensionBuilder::default()
        .author(Some(podcast.author))
        .image(Some(podcast.logo_url))
        .explicit(Some("false".to_owned()))
        .block(Some("yes".to_owned()))
        .build();

    let googleplay_block = ExtensionBuilder::default()
      .name("googleplay:block".to_owned())
      .value(Some("yes".to_owned()))
      .build();
    let mut extensions = ExtensionMap::default();
    extensions
      .entry("googleplay".to_owned())
      .or_default()
      .insert("block".to_owned(), vec![googleplay_block]);

    let mut channel = rss::ChannelBuilder::default()
      .title(podcast.title)
      .description(podcast.description)
      .link(podcast.channel_url)
      .last_build_date(last_build_date)
      .language((!podcast.language.is_empty()).then_some(podcast.language))
      .itunes_ext(Some(itunes_ext))
      .extensions(extensions)
      .generator(Some(GENERATOR_STR.to_owned()))
      .build();

    channel
      .namespaces
      .insert("googleplay".to_owned(), GOOGLEPLAY_NAMESPACE.to_owned());

    for episode in podcast.episodes {
      channel.items.push(episode.into());
    }

    channel
  }
}

#[derive(Debug)]
pub struct Episode {
  pub title: String,
  pub link: String,
  pub description: String,
  pub pub_date: DateTime<Utc>,
  pub guid: String,
  pub duration: u64,
  pub image: String,
  pub audio_url: String,
}

impl From<Episode> for rss::Item {
  fn from(episode: Episode) -> Self {
    let enclosure = rss::EnclosureBuilder::default()
      .url(episode.audio_url)
      .length("0".to_owned())
      .mime_type("audio/mpeg".to_owned())
      .build();

    let itunes =
      rss::extension::itunes::ITunesItemExtensionBuilder::default()
        .image((!episode.image.is_empty()).then_some(episode.image))
        .duration(
          (episode.duration > 0).then(|| seconds_to_duration(episode.duration)),
        )
        .build();

    rss::Item {
      title: Some(episode.title),
      link: Some(episode.link),
      pub_date: Some(episode.pub_date.to_rfc2822()),
      guid: (!episode.guid.is_empty()).then_some(rss::Guid {
        value: episode.guid,
        permalink: false,
      }),
      description: (!episode.description.is_empty())
        .then_some(episode.description),
      itunes_ext: Some(itunes),
      enclosure: Some(enclosure),
      ..Default::default()
    }
  }
}

fn seconds_to_duration(secs: u64) -> String {
  let hours = secs / 3600;
  let minutes = (secs % 3600) / 60;
  let seconds = secs % 60;

  if hours > 0 {
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
  } else {
    format!("{:02}:{:02}", minutes, seconds)
  }
}
