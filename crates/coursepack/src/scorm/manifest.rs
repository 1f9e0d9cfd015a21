//! Typed model of `imsmanifest.xml`.
//!
//! The XML tree is converted right after parsing: namespace prefixes are
//! dropped (elements and attributes are matched on local names) and every
//! element that may repeat is collected into a `Vec`, so consumers never
//! deal with "one or many".

use crate::error::ScormError;
use crate::types::ScormVersion;
use roxmltree::{Document, Node};

/// Deepest element nesting accepted in a manifest.
pub const MAX_MANIFEST_DEPTH: usize = 256;

/// Root of a parsed manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub schema: Option<String>,
    pub schema_version: Option<String>,
    /// `None` when the manifest has no `<organizations>` element
    pub organizations: Option<Organizations>,
    pub resources: Vec<Resource>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Organizations {
    /// Identifier of the default organization (`default` attribute)
    pub default: Option<String>,
    pub list: Vec<Organization>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Organization {
    pub identifier: Option<String>,
    pub title: Option<String>,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Item {
    pub identifier: Option<String>,
    pub identifierref: Option<String>,
    pub title: Option<String>,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resource {
    pub identifier: Option<String>,
    pub href: Option<String>,
    pub scorm_type: Option<String>,
}

impl Manifest {
    /// Parse manifest XML text.
    ///
    /// DTDs are refused; manifests are untrusted input.
    pub fn parse(xml: &str) -> Result<Self, ScormError> {
        let xml = xml.strip_prefix('\u{feff}').unwrap_or(xml);
        if nesting_depth_exceeds(xml.as_bytes(), MAX_MANIFEST_DEPTH) {
            return Err(ScormError::InvalidManifest(
                "manifest nesting too deep".to_string(),
            ));
        }
        let doc = Document::parse(xml).map_err(|e| ScormError::InvalidManifest(e.to_string()))?;

        let root = doc.root_element();
        if root.tag_name().name() != "manifest" {
            return Err(ScormError::InvalidManifest(format!(
                "unexpected root element <{}>",
                root.tag_name().name()
            )));
        }

        let metadata = child(root, "metadata");
        Ok(Manifest {
            schema: metadata.and_then(|m| child_text(m, "schema")),
            schema_version: metadata.and_then(|m| child_text(m, "schemaversion")),
            organizations: child(root, "organizations").map(|orgs| Organizations {
                default: attr(orgs, "default"),
                list: children(orgs, "organization").map(organization).collect(),
            }),
            resources: child(root, "resources")
                .map(|res| children(res, "resource").map(resource).collect())
                .unwrap_or_default(),
        })
    }

    /// Organization named by `default`, else the first one in document order.
    pub fn active_organization(&self) -> Option<&Organization> {
        let orgs = self.organizations.as_ref()?;
        orgs.list
            .iter()
            .find(|org| org.identifier.is_some() && org.identifier == orgs.default)
            .or_else(|| orgs.list.first())
    }

    pub fn resource(&self, identifier: &str) -> Option<&Resource> {
        self.resources
            .iter()
            .find(|res| res.identifier.as_deref() == Some(identifier))
    }

    /// Infers the SCORM edition from `<metadata>`.
    pub fn version(&self) -> ScormVersion {
        let schema = self.schema.as_deref().unwrap_or("").to_lowercase();
        let version = self.schema_version.as_deref().unwrap_or("").to_lowercase();

        if schema.contains("scorm 2004") || version.starts_with("2004") {
            ScormVersion::Scorm2004
        } else if schema.contains("adl scorm") || version.contains("1.2") {
            ScormVersion::Scorm12
        } else {
            ScormVersion::Unknown
        }
    }
}

impl Organization {
    /// First leaf reached by always taking the first item at each level.
    pub fn launch_item(&self) -> Option<&Item> {
        let mut item = self.items.first()?;
        while let Some(first) = item.items.first() {
            item = first;
        }
        Some(item)
    }
}

fn organization(node: Node) -> Organization {
    Organization {
        identifier: attr(node, "identifier"),
        title: child_text(node, "title"),
        items: children(node, "item").map(|n| item(n, 1)).collect(),
    }
}

/// Items below `MAX_MANIFEST_DEPTH` are dropped.
fn item(node: Node, depth: usize) -> Item {
    let items = if depth < MAX_MANIFEST_DEPTH {
        children(node, "item").map(|n| item(n, depth + 1)).collect()
    } else {
        Vec::new()
    };
    Item {
        identifier: attr(node, "identifier"),
        identifierref: attr(node, "identifierref"),
        title: child_text(node, "title"),
        items,
    }
}

/// Byte-level scan of element nesting, run before the tree is built.
///
/// Comments, CDATA sections, processing instructions and declarations do not
/// count; quoted attribute values may contain `>`. Malformed input is left
/// for the XML parser to reject.
fn nesting_depth_exceeds(xml: &[u8], limit: usize) -> bool {
    let mut depth = 0usize;
    let mut pos = 0;
    while let Some(offset) = xml[pos..].iter().position(|b| *b == b'<') {
        let start = pos + offset;
        let rest = &xml[start..];
        if rest.starts_with(b"<!--") {
            pos = skip_past(xml, start + 4, b"-->");
        } else if rest.starts_with(b"<![CDATA[") {
            pos = skip_past(xml, start + 9, b"]]>");
        } else if rest.starts_with(b"<?") {
            pos = skip_past(xml, start + 2, b"?>");
        } else if rest.starts_with(b"<!") {
            pos = skip_past(xml, start + 2, b">");
        } else if rest.starts_with(b"</") {
            depth = depth.saturating_sub(1);
            pos = skip_past(xml, start + 2, b">");
        } else {
            let end = tag_end(xml, start + 1);
            let self_closing = end > 0 && xml.get(end - 1) == Some(&b'/');
            if !self_closing {
                depth += 1;
                if depth > limit {
                    return true;
                }
            }
            pos = (end + 1).min(xml.len());
        }
        if pos >= xml.len() {
            break;
        }
    }
    false
}

/// Index just past the next `needle` at or after `from`, or the input length.
fn skip_past(xml: &[u8], from: usize, needle: &[u8]) -> usize {
    if from >= xml.len() {
        return xml.len();
    }
    xml[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map_or(xml.len(), |at| from + at + needle.len())
}

/// Index of the `>` closing a start tag, honoring quoted attribute values.
fn tag_end(xml: &[u8], from: usize) -> usize {
    let mut quote = None;
    for (i, b) in xml.iter().enumerate().skip(from) {
        match (quote, *b) {
            (None, b'"' | b'\'') => quote = Some(*b),
            (Some(q), b) if b == q => quote = None,
            (None, b'>') => return i,
            _ => {}
        }
    }
    xml.len()
}

fn resource(node: Node) -> Resource {
    Resource {
        identifier: attr(node, "identifier"),
        href: attr(node, "href"),
        scorm_type: attr(node, "scormtype").or_else(|| attr(node, "scormType")),
    }
}

fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

fn child<'a, 'input: 'a>(node: Node<'a, 'input>, name: &'static str) -> Option<Node<'a, 'input>> {
    children(node, name).next()
}

/// Trimmed text of the first `name` child; empty text counts as absent.
fn child_text(node: Node, name: &'static str) -> Option<String> {
    let text: String = child(node, name)?
        .descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Attribute by local name, whatever its namespace prefix.
fn attr(node: Node, name: &str) -> Option<String> {
    node.attributes()
        .find(|a| a.name() == name)
        .map(|a| a.value().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested(tag: &str, depth: usize) -> String {
        format!(
            "{}{}",
            format!("<{}>", tag).repeat(depth),
            format!("</{}>", tag).repeat(depth)
        )
    }

    #[test]
    fn test_nesting_depth_scan() {
        assert!(!nesting_depth_exceeds(nested("a", 256).as_bytes(), 256));
        assert!(nesting_depth_exceeds(nested("a", 257).as_bytes(), 256));

        // Siblings and self-closing tags do not accumulate.
        let flat = "<a><b/><b></b></a>".repeat(1000);
        assert!(!nesting_depth_exceeds(flat.as_bytes(), 2));

        // Markup inside comments, CDATA and attribute values is ignored.
        let hidden = r#"<?xml version="1.0"?><!-- <a><a><a> --><r x="<a>"><![CDATA[<a><a>]]></r>"#;
        assert!(!nesting_depth_exceeds(hidden.as_bytes(), 1));
    }

    #[test]
    fn test_parse_rejects_deep_nesting() {
        let xml = format!("<manifest>{}</manifest>", nested("item", 50_000));
        let err = Manifest::parse(&xml).unwrap_err();
        assert!(matches!(err, ScormError::InvalidManifest(ref m) if m == "manifest nesting too deep"));
    }

    const NESTED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<manifest identifier="M1" xmlns="http://www.imsproject.org/xsd/imscp_rootv1p1p2"
          xmlns:adlcp="http://www.adlnet.org/xsd/adlcp_rootv1p2">
  <metadata>
    <schema>ADL SCORM</schema>
    <schemaversion>1.2</schemaversion>
  </metadata>
  <organizations default="ORG2">
    <organization identifier="ORG1">
      <title>First org</title>
      <item identifier="I1" identifierref="R1"><title>Wrong</title></item>
    </organization>
    <organization identifier="ORG2">
      <title>Second org</title>
      <item identifier="CH1">
        <title>Chapter</title>
        <item identifier="SEC1">
          <title>Section</title>
          <item identifier="LEAF" identifierref="R2"><title>Leaf</title></item>
          <item identifier="OTHER" identifierref="R1"/>
        </item>
      </item>
    </organization>
  </organizations>
  <resources>
    <resource identifier="R1" type="webcontent" adlcp:scormtype="sco" href="one.html"/>
    <resource identifier="R2" type="webcontent" adlcp:scormtype="sco" href="two.html"/>
  </resources>
</manifest>"#;

    #[test]
    fn test_parse_normalizes_lists() {
        let manifest = Manifest::parse(NESTED).unwrap();
        let orgs = manifest.organizations.as_ref().unwrap();
        assert_eq!(orgs.default.as_deref(), Some("ORG2"));
        assert_eq!(orgs.list.len(), 2);
        assert_eq!(manifest.resources.len(), 2);
        assert_eq!(manifest.resources[0].scorm_type.as_deref(), Some("sco"));
    }

    #[test]
    fn test_active_organization_uses_default() {
        let manifest = Manifest::parse(NESTED).unwrap();
        let org = manifest.active_organization().unwrap();
        assert_eq!(org.title.as_deref(), Some("Second org"));
    }

    #[test]
    fn test_active_organization_falls_back_to_first() {
        let xml = NESTED.replace("default=\"ORG2\"", "default=\"NOPE\"");
        let manifest = Manifest::parse(&xml).unwrap();
        let org = manifest.active_organization().unwrap();
        assert_eq!(org.identifier.as_deref(), Some("ORG1"));
    }

    #[test]
    fn test_launch_item_descends_first_children() {
        let manifest = Manifest::parse(NESTED).unwrap();
        let leaf = manifest.active_organization().unwrap().launch_item().unwrap();
        assert_eq!(leaf.identifier.as_deref(), Some("LEAF"));
        assert_eq!(leaf.identifierref.as_deref(), Some("R2"));
        assert_eq!(manifest.resource("R2").unwrap().href.as_deref(), Some("two.html"));
    }

    #[test]
    fn test_version_detection() {
        let mut manifest = Manifest::default();
        assert_eq!(manifest.version(), ScormVersion::Unknown);

        manifest.schema_version = Some("2004 4th Edition".to_string());
        assert_eq!(manifest.version(), ScormVersion::Scorm2004);

        manifest.schema_version = Some("CAM 1.3".to_string());
        manifest.schema = Some("ADL SCORM 2004".to_string());
        assert_eq!(manifest.version(), ScormVersion::Scorm2004);

        manifest.schema = Some("ADL SCORM".to_string());
        assert_eq!(manifest.version(), ScormVersion::Scorm12);

        manifest.schema = None;
        manifest.schema_version = Some("1.2".to_string());
        assert_eq!(manifest.version(), ScormVersion::Scorm12);
    }

    #[test]
    fn test_parse_rejects_malformed_xml() {
        assert!(matches!(
            Manifest::parse("<manifest><organizations>"),
            Err(ScormError::InvalidManifest(_))
        ));
        assert!(matches!(
            Manifest::parse("<notamanifest/>"),
            Err(ScormError::InvalidManifest(_))
        ));
    }

    #[test]
    fn test_parse_prefixed_elements() {
        let xml = r#"<imscp:manifest xmlns:imscp="urn:x">
            <imscp:organizations default="O">
              <imscp:organization identifier="O"><imscp:title>T</imscp:title></imscp:organization>
            </imscp:organizations>
        </imscp:manifest>"#;
        let manifest = Manifest::parse(xml).unwrap();
        let org = manifest.active_organization().unwrap();
        assert_eq!(org.title.as_deref(), Some("T"));
        assert!(org.launch_item().is_none());
    }
}
