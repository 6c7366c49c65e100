use crate::error::{ParseError, RecordError};
use crate::melt::flatten::FieldFlattener;
use crate::melt::owner::{OwnerTree, OWNER_TAG};
use crate::melt::types::{FlatMapping, MeltConfig};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

const ROOT_TAG: &str = "BioSample";

/// Root attributes copied into every mapping, empty when absent
const ROOT_FIELDS: [&str; 4] = ["submission_date", "last_update", "publication_date", "access"];

const OWNER_PATH_PREFIX: &str = "/Owner/";

/// Ordered attribute names that may carry a field name, first present wins
struct NameRule {
    tag: &'static str,
    candidates: &'static [&'static str],
}

const ID_NAME: NameRule = NameRule {
    tag: "Id",
    candidates: &["db", "db_label"],
};

const ATTRIBUTE_NAME: NameRule = NameRule {
    tag: "Attribute",
    candidates: &["harmonized_name", "attribute_name"],
};

impl NameRule {
    fn resolve(&self, attrs: &[(String, String)]) -> Result<String, ParseError> {
        self.candidates
            .iter()
            .find_map(|candidate| attr(attrs, candidate))
            .map(str::to_string)
            .ok_or(ParseError::MissingAttribute {
                tag: self.tag,
                candidates: self.candidates,
            })
    }
}

/// One event of a record document, in document order
#[derive(Debug, Clone, PartialEq)]
pub enum XmlEvent {
    Open {
        name: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
    Close {
        name: String,
    },
}

/// Where the next text event goes; at most one target is active
#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum Awaiting {
    #[default]
    Nothing,
    Title,
    Package,
    Paragraph,
    Field(String),
    DbName(String),
}

/// Walks the events of one document and builds its flat mapping
pub struct RecordExtractor<'a> {
    config: &'a MeltConfig,
    flattener: FieldFlattener,
    fields: FlatMapping,
    awaiting: Awaiting,
    /// Depth of the element that set `awaiting`
    awaiting_depth: usize,
    depth: usize,
    paragraph: String,
    owner: Option<OwnerTree>,
}

impl<'a> RecordExtractor<'a> {
    pub fn new(config: &'a MeltConfig) -> Self {
        RecordExtractor {
            config,
            flattener: FieldFlattener::new(config),
            fields: FlatMapping::new(),
            awaiting: Awaiting::Nothing,
            awaiting_depth: 0,
            depth: 0,
            paragraph: String::new(),
            owner: None,
        }
    }

    pub fn handle(&mut self, event: XmlEvent) -> Result<(), RecordError> {
        match event {
            XmlEvent::Open { name, attrs } => self.open(&name, &attrs),
            XmlEvent::Text(text) => {
                self.text(text);
                Ok(())
            }
            XmlEvent::Close { name } => self.close(&name),
        }
    }

    /// End the walk and hand back the mapping
    pub fn finish(self) -> Result<FlatMapping, RecordError> {
        if self.owner.is_some() {
            return Err(RecordError::Flatten(
                "document ended inside the owner sub-tree".to_string(),
            ));
        }
        Ok(self.fields)
    }

    fn open(&mut self, name: &str, attrs: &[(String, String)]) -> Result<(), RecordError> {
        self.depth += 1;
        if let Some(owner) = self.owner.as_mut() {
            owner.push_element(name, attrs);
            return Ok(());
        }

        match name {
            ROOT_TAG => {
                for field in ROOT_FIELDS {
                    self.set(field, attr_or_empty(attrs, field));
                }
                // The accession is the record key already; only kept on request
                if self.config.include_accession {
                    self.set("accession", attr_or_empty(attrs, "accession"));
                }
            }
            "Id" => self.await_text(Awaiting::DbName(ID_NAME.resolve(attrs)?)),
            "Title" => self.await_text(Awaiting::Title),
            "Organism" => {
                self.set("organism_taxonomy_id", attr_or_empty(attrs, "taxonomy_id"));
                self.set("organism_taxonomy_name", attr_or_empty(attrs, "taxonomy_name"));
            }
            "Paragraph" => self.await_text(Awaiting::Paragraph),
            OWNER_TAG => self.owner = Some(OwnerTree::open(self.config.legacy_ampersands)),
            "Package" => self.await_text(Awaiting::Package),
            "Attribute" => self.await_text(Awaiting::Field(ATTRIBUTE_NAME.resolve(attrs)?)),
            "Link" => {
                self.await_text(link_field(attrs).map_or(Awaiting::Nothing, Awaiting::Field));
            }
            "Status" => {
                self.set("status", attr_or_empty(attrs, "status"));
                self.set("when", attr_or_empty(attrs, "when"));
            }
            _ => {}
        }

        Ok(())
    }

    fn text(&mut self, text: String) {
        if let Some(owner) = self.owner.as_mut() {
            owner.push_text(&text);
            return;
        }

        match std::mem::take(&mut self.awaiting) {
            Awaiting::Nothing => {}
            Awaiting::Title => self.set("title", text),
            Awaiting::Package => self.set("package", text),
            Awaiting::Paragraph => self.paragraph.push_str(&text),
            Awaiting::Field(name) => self.set(name, text),
            Awaiting::DbName(db) => self.set(format!("{}_db", db), text),
        }
    }

    fn close(&mut self, name: &str) -> Result<(), RecordError> {
        let closing_depth = self.depth;
        self.depth = self.depth.saturating_sub(1);

        if let Some(owner) = self.owner.as_mut() {
            if owner.depth() > 1 {
                return owner.close_element(name);
            }
            if name != OWNER_TAG {
                return Err(RecordError::Flatten(format!(
                    "</{}> closes the owner sub-tree",
                    name
                )));
            }
            if let Some(owner) = self.owner.take() {
                self.merge_owner(owner)?;
            }
            return Ok(());
        }

        // An element that closed without text still gets its column
        if closing_depth == self.awaiting_depth {
            match std::mem::take(&mut self.awaiting) {
                Awaiting::Title => self.set("title", String::new()),
                Awaiting::Package => self.set("package", String::new()),
                Awaiting::Field(field) => self.set(field, String::new()),
                Awaiting::DbName(db) => self.set(format!("{}_db", db), String::new()),
                Awaiting::Nothing | Awaiting::Paragraph => {}
            }
        }

        if name == ROOT_TAG {
            let paragraph = std::mem::take(&mut self.paragraph);
            self.set("paragraph", paragraph);
        }

        Ok(())
    }

    fn merge_owner(&mut self, owner: OwnerTree) -> Result<(), RecordError> {
        let Some(mapping) = owner.finish()? else {
            return Ok(());
        };

        for (path, value) in self.flattener.flatten(&mapping, "") {
            let field = match path.strip_prefix(OWNER_PATH_PREFIX) {
                Some(field) => field.to_string(),
                None => path.trim_start_matches('/').to_string(),
            };
            self.fields.insert(field, value);
        }
        Ok(())
    }

    fn await_text(&mut self, target: Awaiting) {
        self.awaiting = target;
        self.awaiting_depth = self.depth;
    }

    fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(field.into(), value.into());
    }
}

/// Extracts flat mappings from BioSample XML documents
pub struct BioSampleMelter {
    config: MeltConfig,
}

impl BioSampleMelter {
    pub fn new(config: MeltConfig) -> Self {
        BioSampleMelter { config }
    }

    /// Melt one record document into its flat mapping
    ///
    /// Nothing is returned for a document that fails part-way.
    pub fn melt(&self, document: &[u8]) -> Result<FlatMapping, RecordError> {
        let mut extractor = RecordExtractor::new(&self.config);
        read_events(document, |event| extractor.handle(event))?;
        extractor.finish()
    }
}

/// Feed the events of `document` to `sink`, stopping at the first error
pub fn read_events<F>(document: &[u8], mut sink: F) -> Result<(), RecordError>
where
    F: FnMut(XmlEvent) -> Result<(), RecordError>,
{
    let mut reader = Reader::from_reader(document);
    reader.config_mut().expand_empty_elements = true;

    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut seen_root = false;

    loop {
        let event = match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                if depth == 0 && seen_root {
                    return Err(malformed(reader.buffer_position() as u64, "more than one root element").into());
                }
                depth += 1;
                seen_root = true;
                XmlEvent::Open {
                    name: tag_name(e.name().as_ref(), reader.buffer_position() as u64)?,
                    attrs: attributes(e, reader.buffer_position() as u64)?,
                }
            }
            Ok(Event::End(ref e)) => {
                depth = depth.saturating_sub(1);
                XmlEvent::Close {
                    name: tag_name(e.name().as_ref(), reader.buffer_position() as u64)?,
                }
            }
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|err| malformed(reader.buffer_position() as u64, err))?;
                XmlEvent::Text(text.into_owned())
            }
            Ok(Event::CData(ref e)) => {
                let text = std::str::from_utf8(e)
                    .map_err(|err| malformed(reader.buffer_position() as u64, err))?;
                XmlEvent::Text(text.to_string())
            }
            Ok(Event::Eof) => break,
            Ok(_) => {
                buf.clear();
                continue;
            }
            Err(err) => return Err(malformed(reader.buffer_position() as u64, err).into()),
        };

        sink(event)?;
        buf.clear();
    }

    if !seen_root {
        return Err(malformed(reader.buffer_position() as u64, "no root element").into());
    }
    if depth > 0 {
        return Err(malformed(reader.buffer_position() as u64, "unexpected end of document").into());
    }
    Ok(())
}

fn tag_name(raw: &[u8], position: u64) -> Result<String, ParseError> {
    std::str::from_utf8(raw)
        .map(str::to_string)
        .map_err(|err| malformed(position, err))
}

fn attributes(start: &BytesStart<'_>, position: u64) -> Result<Vec<(String, String)>, ParseError> {
    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|err| malformed(position, err))?;
        let key = tag_name(attr.key.as_ref(), position)?;
        let value = attr
            .unescape_value()
            .map_err(|err| malformed(position, err))?;
        attrs.push((key, value.into_owned()));
    }
    Ok(attrs)
}

fn malformed(position: u64, err: impl std::fmt::Display) -> ParseError {
    ParseError::Xml {
        position,
        message: err.to_string(),
    }
}

fn attr<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

fn attr_or_empty(attrs: &[(String, String)], name: &str) -> String {
    attr(attrs, name).unwrap_or_default().to_string()
}

/// Field name a `<Link>` element's text is stored under, if it has one
fn link_field(attrs: &[(String, String)]) -> Option<String> {
    match attr(attrs, "type") {
        Some("url") => attr(attrs, "label").map(str::to_string),
        Some("entrez") => attr(attrs, "target").map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn melt(xml: &str) -> Result<FlatMapping, RecordError> {
        BioSampleMelter::new(MeltConfig::default()).melt(xml.as_bytes())
    }

    fn fields(pairs: &[(&str, &str)]) -> FlatMapping {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<BioSampleSet>
  <BioSample access="public" publication_date="2011-02-09T00:00:00.000" last_update="2019-06-20T09:28:48.150" submission_date="2011-02-09T13:51:20.553" id="1" accession="SAMN00000001">
    <Ids>
      <Id db="BioSample" is_primary="1">SAMN00000001</Id>
      <Id db_label="Sample name">HMP-1</Id>
    </Ids>
    <Description>
      <Title>Human stool sample</Title>
      <Organism taxonomy_id="9606" taxonomy_name="Homo sapiens"/>
      <Comment>
        <Paragraph>First part.</Paragraph>
        <Paragraph> Second part.</Paragraph>
      </Comment>
    </Description>
    <Owner>
      <Name abbreviation="NCBI">National Center for Biotechnology Information</Name>
      <Contacts>
        <Contact email="owner@example.org">
          <Name><First>Ada</First><Last>Lovelace</Last></Name>
        </Contact>
      </Contacts>
    </Owner>
    <Models><Model>Human</Model></Models>
    <Package display_name="Human; version 1.0">Human.1.0</Package>
    <Attributes>
      <Attribute attribute_name="host_age" harmonized_name="age" display_name="age">45</Attribute>
      <Attribute attribute_name="gender" harmonized_name="sex" display_name="sex">M</Attribute>
      <Attribute attribute_name="body site">stool</Attribute>
    </Attributes>
    <Links>
      <Link type="entrez" target="bioproject" label="PRJNA1">1</Link>
      <Link type="url" label="Project page">http://example.org/p</Link>
      <Link type="other">dropped</Link>
    </Links>
    <Status status="live" when="2014-01-01T00:00:00"/>
  </BioSample>
</BioSampleSet>"#;

    #[test]
    fn test_full_document() {
        let mapping = melt(SAMPLE).unwrap();

        let expected = fields(&[
            ("submission_date", "2011-02-09T13:51:20.553"),
            ("last_update", "2019-06-20T09:28:48.150"),
            ("publication_date", "2011-02-09T00:00:00.000"),
            ("access", "public"),
            ("BioSample_db", "SAMN00000001"),
            ("Sample name_db", "HMP-1"),
            ("title", "Human stool sample"),
            ("organism_taxonomy_id", "9606"),
            ("organism_taxonomy_name", "Homo sapiens"),
            ("Name/@abbreviation", "NCBI"),
            ("Name/#text", "National Center for Biotechnology Information"),
            ("Contacts/Contact/@email", "owner@example.org"),
            ("Contacts/Contact/Name/First", "Ada"),
            ("Contacts/Contact/Name/Last", "Lovelace"),
            ("package", "Human.1.0"),
            ("age", "45"),
            ("sex", "M"),
            ("body site", "stool"),
            ("bioproject", "1"),
            ("Project page", "http://example.org/p"),
            ("status", "live"),
            ("when", "2014-01-01T00:00:00"),
            ("paragraph", "First part. Second part."),
        ]);

        assert_eq!(mapping.into_iter().collect::<Vec<_>>(), expected.into_iter().collect::<Vec<_>>());
    }

    #[test]
    fn test_missing_root_attributes_are_empty() {
        let mapping = melt(r#"<BioSample access="public"></BioSample>"#).unwrap();
        assert_eq!(mapping["access"], "public");
        assert_eq!(mapping["submission_date"], "");
        assert_eq!(mapping["last_update"], "");
        assert_eq!(mapping["publication_date"], "");
        assert_eq!(mapping["paragraph"], "");
        assert!(!mapping.contains_key("accession"));
    }

    #[test]
    fn test_accession_kept_on_request() {
        let config = MeltConfig {
            include_accession: true,
            ..MeltConfig::default()
        };
        let mapping = BioSampleMelter::new(config)
            .melt(br#"<BioSample accession="SAMN42"/>"#)
            .unwrap();
        assert_eq!(mapping["accession"], "SAMN42");
    }

    #[test]
    fn test_harmonized_attributes() {
        let mapping = melt(
            r#"<BioSample><Attributes>
                <Attribute harmonized_name="age">45</Attribute>
                <Attribute harmonized_name="sex">M</Attribute>
            </Attributes></BioSample>"#,
        )
        .unwrap();
        assert_eq!(mapping["age"], "45");
        assert_eq!(mapping["sex"], "M");
    }

    #[test]
    fn test_entrez_link() {
        let mapping = melt(r#"<BioSample><Links><Link type="entrez" target="gene">1234</Link></Links></BioSample>"#).unwrap();
        assert_eq!(mapping["gene"], "1234");
    }

    #[test]
    fn test_unnamed_link_text_is_dropped() {
        let mapping = melt(
            r#"<BioSample><Links>
                <Link type="url">http://nowhere</Link>
                <Link type="entrez">5</Link>
            </Links></BioSample>"#,
        )
        .unwrap();
        assert!(!mapping.values().any(|v| v == "http://nowhere" || v == "5"));
    }

    #[test]
    fn test_id_without_name_fails() {
        let err = melt(r#"<BioSample><Ids><Id>1</Id></Ids></BioSample>"#).unwrap_err();
        assert!(matches!(
            err,
            RecordError::Parse(ParseError::MissingAttribute { tag: "Id", .. })
        ));
    }

    #[test]
    fn test_attribute_without_name_fails() {
        let err = melt(r#"<BioSample><Attribute display_name="x">1</Attribute></BioSample>"#).unwrap_err();
        assert!(matches!(
            err,
            RecordError::Parse(ParseError::MissingAttribute { tag: "Attribute", .. })
        ));
    }

    #[test]
    fn test_malformed_documents_fail() {
        for xml in [
            "",
            "not xml at all",
            "<BioSample><Title>x</Description></BioSample>",
            "<BioSample><Title>unclosed",
            "<BioSample><Title>A & B</Title></BioSample>",
        ] {
            let err = melt(xml).unwrap_err();
            assert!(matches!(err, RecordError::Parse(ParseError::Xml { .. })), "{:?}", xml);
        }
    }

    #[test]
    fn test_empty_elements_keep_their_columns() {
        let mapping = melt(r#"<BioSample><Title/><Package></Package><Attribute harmonized_name="age"/></BioSample>"#).unwrap();
        assert_eq!(mapping["title"], "");
        assert_eq!(mapping["package"], "");
        assert_eq!(mapping["age"], "");
    }

    #[test]
    fn test_text_whitespace_is_kept() {
        let mapping = melt(
            r#"<BioSample>
                <Comment><Paragraph>First part.</Paragraph><Paragraph> Second part.</Paragraph></Comment>
                <Attribute harmonized_name="note">  padded  </Attribute>
            </BioSample>"#,
        )
        .unwrap();
        assert_eq!(mapping["paragraph"], "First part. Second part.");
        assert_eq!(mapping["note"], "  padded  ");
    }

    #[test]
    fn test_child_close_keeps_pending_field() {
        let mapping = melt(r#"<BioSample><Id db="x"><sub/>v</Id><Title><b/></Title></BioSample>"#).unwrap();
        assert_eq!(mapping["x_db"], "v");
        assert_eq!(mapping["title"], "");
    }

    #[test]
    fn test_later_writes_win() {
        let mapping = melt(
            r#"<BioSample>
                <Attribute attribute_name="note">first</Attribute>
                <Attribute attribute_name="note">second</Attribute>
            </BioSample>"#,
        )
        .unwrap();
        assert_eq!(mapping["note"], "second");
    }

    #[test]
    fn test_escaped_ampersand_survives_in_owner() {
        let mapping = melt(r#"<BioSample><Owner><Name>Smith &amp; Sons</Name></Owner></BioSample>"#).unwrap();
        assert_eq!(mapping["Name"], "Smith & Sons");
    }

    #[test]
    fn test_owner_contacts_are_qualified() {
        let mapping = melt(
            r#"<BioSample><Owner><Contacts>
                <Contact type="submitter">a@example.org</Contact>
                <Contact type="curator">b@example.org</Contact>
                <Contact type="lab">c@example.org</Contact>
            </Contacts></Owner></BioSample>"#,
        )
        .unwrap();
        assert_eq!(mapping["Contacts/Contact/@type=submitter"], "a@example.org");
        assert_eq!(mapping["Contacts/Contact/@type=curator"], "b@example.org");
        assert_eq!(mapping["Contacts/Contact/@type=lab"], "c@example.org");
    }

    #[test]
    fn test_recognized_tags_inside_owner_are_captured() {
        let mapping = melt(r#"<BioSample><Owner><Title>Lab</Title></Owner><Title>Sample</Title></BioSample>"#).unwrap();
        assert_eq!(mapping["Title"], "Lab");
        assert_eq!(mapping["title"], "Sample");
    }

    #[test]
    fn test_extraction_is_repeatable() {
        let first = melt(SAMPLE).unwrap();
        let second = melt(SAMPLE).unwrap();
        assert_eq!(first.into_iter().collect::<Vec<_>>(), second.into_iter().collect::<Vec<_>>());
    }

    #[test]
    fn test_synthetic_events() {
        let config = MeltConfig::default();
        let mut extractor = RecordExtractor::new(&config);
        let events = vec![
            XmlEvent::Open { name: "BioSample".into(), attrs: vec![] },
            XmlEvent::Open { name: "Paragraph".into(), attrs: vec![] },
            XmlEvent::Text("one".into()),
            XmlEvent::Text("ignored".into()),
            XmlEvent::Close { name: "Paragraph".into() },
            XmlEvent::Open { name: "Paragraph".into(), attrs: vec![] },
            XmlEvent::Text(" two".into()),
            XmlEvent::Close { name: "Paragraph".into() },
            XmlEvent::Close { name: "BioSample".into() },
        ];
        for event in events {
            extractor.handle(event).unwrap();
        }
        assert_eq!(extractor.finish().unwrap()["paragraph"], "one two");
    }

    #[test]
    fn test_unterminated_owner_is_a_flatten_error() {
        let config = MeltConfig::default();
        let mut extractor = RecordExtractor::new(&config);
        extractor
            .handle(XmlEvent::Open { name: "Owner".into(), attrs: vec![] })
            .unwrap();
        assert!(matches!(extractor.finish(), Err(RecordError::Flatten(_))));
    }
}
