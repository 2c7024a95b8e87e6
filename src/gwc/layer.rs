//! GeoWebCache layer configuration document.
//!
//! The layer XML is read once into the handful of fields the sync needs. The
//! original text is kept so that writing the document back only touches the
//! TIME filter's `values` and `defaultValue`; every other element passes
//! through as it came from the server.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::time::{TimeFormat, TimeParseError, TimeSet, TimeValue};

use super::types::{BoundingBox, GridSets};

const TIME_KEY: &str = "TIME";

#[derive(Debug, thiserror::Error)]
pub enum LayerDocError {
  #[error("Malformed layer XML: {0}")]
  Xml(String),

  #[error("Layer has no TIME string parameter filter")]
  MissingTimeFilter,

  #[error("Bad TIME filter entry: {0}")]
  BadTime(#[from] TimeParseError),

  #[error("Grid subset {0} does not have four extent coordinates")]
  BadGridSubset(String),
}

fn xml_err(e: impl std::fmt::Display) -> LayerDocError {
  LayerDocError::Xml(e.to_string())
}

/// A configured TIME filter value, parsed once when the document is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeEntry {
  pub text: String,
  pub value: TimeValue,
}

impl TimeEntry {
  pub fn parse(text: &str) -> Result<Self, TimeParseError> {
    Ok(Self {
      text: text.trim().to_string(),
      value: TimeValue::parse(text)?,
    })
  }

  /// Spell `value` in `format`.
  ///
  /// The stored instant is the one the text reads back as, so sub-second
  /// digits the format cannot show are dropped from both.
  pub fn render(value: TimeValue, format: TimeFormat) -> Self {
    let value = value.at_precision(format);
    Self {
      text: value.format(format),
      value,
    }
  }
}

/// In-memory view of `{base}/layers/{id}.xml`.
#[derive(Debug, Clone)]
pub struct ConfigDocument {
  layer: String,
  grid_sets: GridSets,
  entries: Vec<TimeEntry>,
  default_value: Option<String>,
  raw: String,
}

#[derive(Default)]
struct FilterScan {
  key: String,
  default_value: Option<String>,
  values: Vec<String>,
}

#[derive(Default)]
struct SubsetScan {
  name: String,
  coords: Vec<String>,
}

fn path_ends_with(path: &[String], suffix: &[&str]) -> bool {
  path.len() >= suffix.len()
    && path[path.len() - suffix.len()..]
      .iter()
      .zip(suffix)
      .all(|(a, b)| a == b)
}

impl ConfigDocument {
  pub fn parse(xml: &str) -> Result<Self, LayerDocError> {
    let mut reader = Reader::from_str(xml);
    let mut path: Vec<String> = Vec::new();

    let mut layer = String::new();
    let mut grid_sets = GridSets::new();
    let mut subset: Option<SubsetScan> = None;
    let mut filter: Option<FilterScan> = None;
    let mut time_filter: Option<FilterScan> = None;

    loop {
      match reader.read_event().map_err(xml_err)? {
        Event::Start(e) => {
          let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
          match name.as_str() {
            "gridSubset" => subset = Some(SubsetScan::default()),
            "stringParameterFilter" => filter = Some(FilterScan::default()),
            "string" if path_ends_with(&path, &["stringParameterFilter", "values"]) => {
              if let Some(f) = filter.as_mut() {
                f.values.push(String::new());
              }
            }
            "double" if path_ends_with(&path, &["gridSubset", "extent", "coords"]) => {
              if let Some(s) = subset.as_mut() {
                s.coords.push(String::new());
              }
            }
            _ => {}
          }
          path.push(name);
        }
        Event::Empty(e) => {
          // `<string/>` is an empty value; it fails as a time below.
          if e.local_name().as_ref() == b"string"
            && path_ends_with(&path, &["stringParameterFilter", "values"])
          {
            if let Some(f) = filter.as_mut() {
              f.values.push(String::new());
            }
          }
        }
        Event::End(e) => {
          match e.local_name().as_ref() {
            b"gridSubset" => {
              if let Some(s) = subset.take().filter(|s| !s.coords.is_empty()) {
                let coords = s
                  .coords
                  .iter()
                  .map(|c| c.trim().parse::<f64>())
                  .collect::<Result<Vec<_>, _>>()
                  .map_err(|_| LayerDocError::BadGridSubset(s.name.clone()))?;
                let bbox = BoundingBox::from_coords(&coords)
                  .ok_or_else(|| LayerDocError::BadGridSubset(s.name.clone()))?;
                grid_sets.insert(s.name.trim().to_string(), bbox);
              }
            }
            b"stringParameterFilter" => {
              if let Some(f) = filter.take() {
                if f.key.trim().eq_ignore_ascii_case(TIME_KEY) {
                  time_filter = Some(f);
                }
              }
            }
            _ => {}
          }
          path.pop();
        }
        Event::Text(t) => {
          let text = t.unescape().map_err(xml_err)?;
          if path.len() == 2 && path[1] == "name" {
            layer.push_str(&text);
          } else if path_ends_with(&path, &["gridSubset", "gridSetName"]) {
            if let Some(s) = subset.as_mut() {
              s.name.push_str(&text);
            }
          } else if path_ends_with(&path, &["coords", "double"]) {
            if let Some(c) = subset.as_mut().and_then(|s| s.coords.last_mut()) {
              c.push_str(&text);
            }
          } else if path_ends_with(&path, &["stringParameterFilter", "key"]) {
            if let Some(f) = filter.as_mut() {
              f.key.push_str(&text);
            }
          } else if path_ends_with(&path, &["stringParameterFilter", "defaultValue"]) {
            if let Some(f) = filter.as_mut() {
              f.default_value.get_or_insert_with(String::new).push_str(&text);
            }
          } else if path_ends_with(&path, &["values", "string"]) {
            if let Some(v) = filter.as_mut().and_then(|f| f.values.last_mut()) {
              v.push_str(&text);
            }
          }
        }
        Event::Eof => break,
        _ => {}
      }
    }

    let time_filter = time_filter.ok_or(LayerDocError::MissingTimeFilter)?;
    let entries = time_filter
      .values
      .iter()
      .map(|v| TimeEntry::parse(v))
      .collect::<Result<Vec<_>, _>>()?;

    Ok(Self {
      layer: layer.trim().to_string(),
      grid_sets,
      entries,
      default_value: time_filter
        .default_value
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty()),
      raw: xml.to_string(),
    })
  }

  pub fn layer(&self) -> &str {
    &self.layer
  }

  pub fn grid_sets(&self) -> &GridSets {
    &self.grid_sets
  }

  pub fn entries(&self) -> &[TimeEntry] {
    &self.entries
  }

  pub fn default_value(&self) -> Option<&str> {
    self.default_value.as_deref()
  }

  /// Instants currently configured on the TIME filter.
  pub fn configured_times(&self) -> TimeSet {
    self.entries.iter().map(|e| e.value).collect()
  }

  pub(crate) fn push_entry(&mut self, entry: TimeEntry) {
    self.entries.push(entry);
  }

  pub(crate) fn retain_entries(&mut self, keep: impl FnMut(&TimeEntry) -> bool) {
    self.entries.retain(keep);
  }

  pub(crate) fn set_default_value(&mut self, value: String) {
    self.default_value = Some(value);
  }

  /// Re-emit the original XML with the current TIME entries and default.
  pub fn to_xml(&self) -> Result<String, LayerDocError> {
    let mut reader = Reader::from_str(&self.raw);
    let mut writer = Writer::new(Vec::new());
    let mut pending: Option<Vec<Event<'static>>> = None;
    let mut depth = 0usize;

    loop {
      let event = reader.read_event().map_err(xml_err)?;
      if matches!(event, Event::Eof) {
        break;
      }

      if let Some(mut buffered) = pending.take() {
        match &event {
          Event::Start(_) => depth += 1,
          Event::End(_) => depth -= 1,
          _ => {}
        }
        buffered.push(event.into_owned());
        if depth == 0 {
          self.write_filter(&mut writer, buffered)?;
        } else {
          pending = Some(buffered);
        }
        continue;
      }

      if let Event::Start(e) = &event {
        if e.local_name().as_ref() == b"stringParameterFilter" {
          pending = Some(vec![event.into_owned()]);
          depth = 1;
          continue;
        }
      }

      writer.write_event(event).map_err(xml_err)?;
    }

    String::from_utf8(writer.into_inner()).map_err(xml_err)
  }

  /// Write one buffered `stringParameterFilter`, rewriting it if it is TIME.
  fn write_filter(
    &self,
    writer: &mut Writer<Vec<u8>>,
    events: Vec<Event<'static>>,
  ) -> Result<(), LayerDocError> {
    if !filter_key_is_time(&events)? {
      for event in events {
        writer.write_event(event).map_err(xml_err)?;
      }
      return Ok(());
    }

    let mut depth = 0usize;
    let mut skipping = false;
    let mut saw_values = false;
    let mut saw_default = false;

    for event in events {
      match &event {
        Event::Start(e) => {
          depth += 1;
          if skipping {
            continue;
          }
          if depth == 2 && e.local_name().as_ref() == b"values" {
            writer.write_event(event).map_err(xml_err)?;
            self.write_values(writer)?;
            saw_values = true;
            skipping = true;
            continue;
          }
          if depth == 2 && e.local_name().as_ref() == b"defaultValue" {
            writer.write_event(event).map_err(xml_err)?;
            self.write_default_text(writer)?;
            saw_default = true;
            skipping = true;
            continue;
          }
        }
        Event::End(_) => {
          if skipping && depth == 2 {
            skipping = false;
          } else if skipping {
            depth -= 1;
            continue;
          } else if depth == 1 {
            if !saw_default {
              self.write_default_element(writer)?;
            }
            if !saw_values {
              self.write_values_element(writer)?;
            }
          }
          depth -= 1;
        }
        Event::Empty(e) if !skipping && depth == 1 => match e.local_name().as_ref() {
          b"values" => {
            self.write_values_element(writer)?;
            saw_values = true;
            continue;
          }
          b"defaultValue" => {
            self.write_default_element(writer)?;
            saw_default = true;
            continue;
          }
          _ => {}
        },
        _ if skipping => continue,
        _ => {}
      }
      writer.write_event(event).map_err(xml_err)?;
    }

    Ok(())
  }

  fn write_values(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), LayerDocError> {
    for entry in &self.entries {
      writer
        .write_event(Event::Start(BytesStart::new("string")))
        .map_err(xml_err)?;
      writer
        .write_event(Event::Text(BytesText::new(&entry.text)))
        .map_err(xml_err)?;
      writer
        .write_event(Event::End(BytesEnd::new("string")))
        .map_err(xml_err)?;
    }
    Ok(())
  }

  fn write_values_element(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), LayerDocError> {
    writer
      .write_event(Event::Start(BytesStart::new("values")))
      .map_err(xml_err)?;
    self.write_values(writer)?;
    writer
      .write_event(Event::End(BytesEnd::new("values")))
      .map_err(xml_err)
  }

  fn write_default_text(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), LayerDocError> {
    if let Some(default) = &self.default_value {
      writer
        .write_event(Event::Text(BytesText::new(default)))
        .map_err(xml_err)?;
    }
    Ok(())
  }

  fn write_default_element(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), LayerDocError> {
    if self.default_value.is_none() {
      return Ok(());
    }
    writer
      .write_event(Event::Start(BytesStart::new("defaultValue")))
      .map_err(xml_err)?;
    self.write_default_text(writer)?;
    writer
      .write_event(Event::End(BytesEnd::new("defaultValue")))
      .map_err(xml_err)
  }
}

/// Whether a buffered `stringParameterFilter` has `<key>TIME</key>`.
fn filter_key_is_time(events: &[Event<'static>]) -> Result<bool, LayerDocError> {
  let mut depth = 0usize;
  let mut in_key = false;
  let mut key = String::new();

  for event in events {
    match event {
      Event::Start(e) => {
        depth += 1;
        in_key = depth == 2 && e.local_name().as_ref() == b"key";
      }
      Event::End(_) => {
        depth -= 1;
        in_key = false;
      }
      Event::Text(t) if in_key => key.push_str(&t.unescape().map_err(xml_err)?),
      _ => {}
    }
  }

  Ok(key.trim().eq_ignore_ascii_case(TIME_KEY))
}
