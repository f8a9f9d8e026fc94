//! Slide-deck exporter: one full-bleed picture slide per image (`.pptx`).
//!
//! A PresentationML package is a zip of XML parts. We emit the smallest set
//! PowerPoint, Keynote and LibreOffice all open: one master, one blank
//! layout, one theme, then `slideN.xml` + `imageN.jpg` per slide. Images are
//! copied verbatim into `ppt/media/`.

use crate::error::PipelineError;
use std::fmt::Write as _;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// 16:9 slide width in EMU (13.333 in).
pub const SLIDE_WIDTH_EMU: u64 = 12_192_000;
/// 16:9 slide height in EMU (7.5 in).
pub const SLIDE_HEIGHT_EMU: u64 = 6_858_000;

const FORMAT: &str = "PPTX";

/// In-memory deck; slides are appended in order and written on [`DeckBuilder::save`].
#[derive(Debug, Default)]
pub struct DeckBuilder {
    slides: Vec<Vec<u8>>,
}

impl DeckBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a slide whose only content is the JPEG at `path`, stretched to the slide.
    pub fn add_image_slide(&mut self, path: &Path) -> Result<(), PipelineError> {
        let format = image::ImageFormat::from_path(path)
            .ok()
            .filter(|f| *f == image::ImageFormat::Jpeg);
        if format.is_none() {
            return Err(PipelineError::export(
                FORMAT,
                format!("failed to add image to slide: {} is not a JPEG", path.display()),
            ));
        }
        image::image_dimensions(path).map_err(|e| {
            PipelineError::export(FORMAT, format!("failed to add image to slide: {e}"))
        })?;
        let bytes = std::fs::read(path).map_err(|e| {
            PipelineError::export(FORMAT, format!("failed to add image to slide: {e}"))
        })?;
        self.slides.push(bytes);
        debug!("Added slide {} from {}", self.slides.len(), path.display());
        Ok(())
    }

    #[cfg(test)]
    fn slide_count(&self) -> usize {
        self.slides.len()
    }

    /// Write the package to `output`.
    pub fn save(&self, output: &Path) -> Result<(), PipelineError> {
        let file = File::create(output)
            .map_err(|e| PipelineError::export(FORMAT, format!("failed to save PPTX: {e}")))?;
        self.write_package(file)
            .map_err(|e| PipelineError::export(FORMAT, format!("failed to save PPTX: {e}")))?;
        info!("Wrote {} slide deck → {}", self.slides.len(), output.display());
        Ok(())
    }

    fn write_package<W: Write + std::io::Seek>(&self, sink: W) -> zip::result::ZipResult<()> {
        let mut zip = ZipWriter::new(sink);
        let xml = FileOptions::default().compression_method(CompressionMethod::Deflated);
        let media = FileOptions::default().compression_method(CompressionMethod::Stored);
        let n = self.slides.len();

        let part = |zip: &mut ZipWriter<W>, name: &str, body: &str| -> zip::result::ZipResult<()> {
            zip.start_file(name, xml)?;
            zip.write_all(body.as_bytes())?;
            Ok(())
        };

        part(&mut zip, "[Content_Types].xml", &content_types(n))?;
        part(&mut zip, "_rels/.rels", ROOT_RELS)?;
        part(&mut zip, "docProps/app.xml", &app_props(n))?;
        part(&mut zip, "docProps/core.xml", CORE_PROPS)?;
        part(&mut zip, "ppt/presentation.xml", &presentation(n))?;
        part(&mut zip, "ppt/_rels/presentation.xml.rels", &presentation_rels(n))?;
        part(&mut zip, "ppt/presProps.xml", PRES_PROPS)?;
        part(&mut zip, "ppt/viewProps.xml", VIEW_PROPS)?;
        part(&mut zip, "ppt/tableStyles.xml", TABLE_STYLES)?;
        part(&mut zip, "ppt/theme/theme1.xml", THEME)?;
        part(&mut zip, "ppt/slideMasters/slideMaster1.xml", SLIDE_MASTER)?;
        part(
            &mut zip,
            "ppt/slideMasters/_rels/slideMaster1.xml.rels",
            SLIDE_MASTER_RELS,
        )?;
        part(&mut zip, "ppt/slideLayouts/slideLayout1.xml", SLIDE_LAYOUT)?;
        part(
            &mut zip,
            "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
            SLIDE_LAYOUT_RELS,
        )?;

        for (i, jpeg) in self.slides.iter().enumerate() {
            let num = i + 1;
            part(&mut zip, &format!("ppt/slides/slide{num}.xml"), &slide(num))?;
            part(
                &mut zip,
                &format!("ppt/slides/_rels/slide{num}.xml.rels"),
                &slide_rels(num),
            )?;
            zip.start_file(format!("ppt/media/image{num}.jpg"), media)?;
            zip.write_all(jpeg)?;
        }

        zip.finish()?;
        Ok(())
    }
}

/// Build a deck from `images` (one slide each, in order) and write it to `output`.
pub fn build_deck<P: AsRef<Path>>(images: &[P], output: &Path) -> Result<PathBuf, PipelineError> {
    let mut deck = DeckBuilder::new();
    for image in images {
        deck.add_image_slide(image.as_ref())?;
    }
    deck.save(output)?;
    Ok(output.to_path_buf())
}

// ── Package parts ────────────────────────────────────────────────────────

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;
const NS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

fn content_types(n: usize) -> String {
    let mut s = format!(
        r#"{XML_DECL}<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="jpg" ContentType="image/jpeg"/><Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/><Override PartName="/ppt/presProps.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presProps+xml"/><Override PartName="/ppt/viewProps.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.viewProps+xml"/><Override PartName="/ppt/tableStyles.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.tableStyles+xml"/><Override PartName="/ppt/theme/theme1.xml" ContentType="application/vnd.openxmlformats-officedocument.theme+xml"/><Override PartName="/ppt/slideMasters/slideMaster1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml"/><Override PartName="/ppt/slideLayouts/slideLayout1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml"/><Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/><Override PartName="/docProps/app.xml" ContentType="application/vnd.openxmlformats-officedocument.extended-properties+xml"/>"#
    );
    for num in 1..=n {
        let _ = write!(
            s,
            r#"<Override PartName="/ppt/slides/slide{num}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>"#
        );
    }
    s.push_str("</Types>");
    s
}

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="ppt/presentation.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/><Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties" Target="docProps/app.xml"/></Relationships>"#;

const CORE_PROPS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><dc:title>Slides</dc:title><dc:creator>slides-export</dc:creator></cp:coreProperties>"#;

fn app_props(n: usize) -> String {
    format!(
        r#"{XML_DECL}<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties"><Application>slides-export</Application><Slides>{n}</Slides></Properties>"#
    )
}

fn presentation(n: usize) -> String {
    let mut ids = String::new();
    for i in 0..n {
        // Slide ids start at 256; rIds 1..=3 are master, props and theme.
        let _ = write!(ids, r#"<p:sldId id="{}" r:id="rId{}"/>"#, 256 + i, 10 + i);
    }
    let slide_list = if n == 0 {
        String::new()
    } else {
        format!("<p:sldIdLst>{ids}</p:sldIdLst>")
    };
    format!(
        r#"{XML_DECL}<p:presentation xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}" saveSubsetFonts="1"><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst>{slide_list}<p:sldSz cx="{SLIDE_WIDTH_EMU}" cy="{SLIDE_HEIGHT_EMU}"/><p:notesSz cx="6858000" cy="9144000"/></p:presentation>"#
    )
}

fn presentation_rels(n: usize) -> String {
    let mut s = format!(
        r#"{XML_DECL}<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{REL_BASE}/slideMaster" Target="slideMasters/slideMaster1.xml"/><Relationship Id="rId2" Type="{REL_BASE}/presProps" Target="presProps.xml"/><Relationship Id="rId3" Type="{REL_BASE}/theme" Target="theme/theme1.xml"/><Relationship Id="rId4" Type="{REL_BASE}/viewProps" Target="viewProps.xml"/><Relationship Id="rId5" Type="{REL_BASE}/tableStyles" Target="tableStyles.xml"/>"#
    );
    for i in 0..n {
        let _ = write!(
            s,
            r#"<Relationship Id="rId{}" Type="{REL_BASE}/slide" Target="slides/slide{}.xml"/>"#,
            10 + i,
            i + 1
        );
    }
    s.push_str("</Relationships>");
    s
}

fn slide(num: usize) -> String {
    format!(
        r#"{XML_DECL}<p:sld xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr><p:pic><p:nvPicPr><p:cNvPr id="2" name="Slide Image {num}"/><p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="rId2"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{SLIDE_WIDTH_EMU}" cy="{SLIDE_HEIGHT_EMU}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic></p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#
    )
}

fn slide_rels(num: usize) -> String {
    format!(
        r#"{XML_DECL}<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{REL_BASE}/slideLayout" Target="../slideLayouts/slideLayout1.xml"/><Relationship Id="rId2" Type="{REL_BASE}/image" Target="../media/image{num}.jpg"/></Relationships>"#
    )
}

const PRES_PROPS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:presentationPr xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"/>"#;

const VIEW_PROPS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:viewPr xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:normalViewPr><p:restoredLeft sz="15620"/><p:restoredTop sz="94660"/></p:normalViewPr><p:gridSpacing cx="76200" cy="76200"/></p:viewPr>"#;

const TABLE_STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><a:tblStyleLst xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" def="{5C22544A-7EE6-4342-B048-85BDC9FD1C3A}"/>"#;

const SLIDE_MASTER: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sldMaster xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:bg><p:bgRef idx="1001"><a:schemeClr val="bg1"/></p:bgRef></p:bg><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr></p:spTree></p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/><p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst><p:txStyles><p:titleStyle/><p:bodyStyle/><p:otherStyle/></p:txStyles></p:sldMaster>"#;

const SLIDE_MASTER_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme" Target="../theme/theme1.xml"/></Relationships>"#;

const SLIDE_LAYOUT: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sldLayout xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" type="blank" preserve="1"><p:cSld name="Blank"><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr></p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#;

const SLIDE_LAYOUT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster" Target="../slideMasters/slideMaster1.xml"/></Relationships>"#;

const THEME: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Office Theme"><a:themeElements><a:clrScheme name="Office"><a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1><a:lt1><a:sysClr val="window" lastClr="FFFFFF"/></a:lt1><a:dk2><a:srgbClr val="1F497D"/></a:dk2><a:lt2><a:srgbClr val="EEECE1"/></a:lt2><a:accent1><a:srgbClr val="4F81BD"/></a:accent1><a:accent2><a:srgbClr val="C0504D"/></a:accent2><a:accent3><a:srgbClr val="9BBB59"/></a:accent3><a:accent4><a:srgbClr val="8064A2"/></a:accent4><a:accent5><a:srgbClr val="4BACC6"/></a:accent5><a:accent6><a:srgbClr val="F79646"/></a:accent6><a:hlink><a:srgbClr val="0000FF"/></a:hlink><a:folHlink><a:srgbClr val="800080"/></a:folHlink></a:clrScheme><a:fontScheme name="Office"><a:majorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont><a:minorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont></a:fontScheme><a:fmtScheme name="Office"><a:fillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:fillStyleLst><a:lnStyleLst><a:ln w="9525"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="25400"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="38100"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln></a:lnStyleLst><a:effectStyleLst><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle></a:effectStyleLst><a:bgFillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:bgFillStyleLst></a:fmtScheme></a:themeElements></a:theme>"#;

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Read;
    use tempfile::TempDir;

    fn jpeg(dir: &TempDir, name: &str, shade: u8) -> PathBuf {
        let p = dir.path().join(name);
        DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 18, Rgb([shade, shade, shade])))
            .save_with_format(&p, ImageFormat::Jpeg)
            .unwrap();
        p
    }

    fn read_entry(archive: &mut zip::ZipArchive<File>, name: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        archive.by_name(name).unwrap().read_to_end(&mut buf).unwrap();
        buf
    }

    #[test]
    fn one_slide_per_image_with_media_copied_verbatim() {
        let dir = TempDir::new().unwrap();
        let imgs = vec![jpeg(&dir, "a.jpg", 10), jpeg(&dir, "b.jpg", 200)];
        let out = dir.path().join("deck.pptx");
        build_deck(&imgs, &out).unwrap();

        let mut archive = zip::ZipArchive::new(File::open(&out).unwrap()).unwrap();
        for (i, src) in imgs.iter().enumerate() {
            let num = i + 1;
            let media = read_entry(&mut archive, &format!("ppt/media/image{num}.jpg"));
            assert_eq!(media, std::fs::read(src).unwrap());
            let slide_xml =
                String::from_utf8(read_entry(&mut archive, &format!("ppt/slides/slide{num}.xml")))
                    .unwrap();
            assert!(slide_xml.contains(r#"r:embed="rId2""#));
            assert!(slide_xml.contains(&format!(r#"cx="{SLIDE_WIDTH_EMU}""#)));
        }
        assert!(archive.by_name("ppt/slides/slide3.xml").is_err());

        let pres = String::from_utf8(read_entry(&mut archive, "ppt/presentation.xml")).unwrap();
        assert_eq!(pres.matches("<p:sldId ").count(), 2);
        let types = String::from_utf8(read_entry(&mut archive, "[Content_Types].xml")).unwrap();
        assert!(types.contains("/ppt/slides/slide2.xml"));
    }

    #[test]
    fn failing_append_aborts_whole_deck() {
        let dir = TempDir::new().unwrap();
        let good = jpeg(&dir, "a.jpg", 10);
        let missing = dir.path().join("missing.jpg");
        let out = dir.path().join("deck.pptx");

        let err = build_deck(&[good, missing], &out).unwrap_err();
        assert!(err.to_string().contains("failed to add image to slide"));
        assert_eq!(err.status_code(), 500);
        assert!(!out.exists(), "no partial deck is written");
    }

    #[test]
    fn builder_counts_slides() {
        let dir = TempDir::new().unwrap();
        let mut deck = DeckBuilder::new();
        deck.add_image_slide(&jpeg(&dir, "a.jpg", 1)).unwrap();
        deck.add_image_slide(&jpeg(&dir, "b.jpg", 2)).unwrap();
        assert_eq!(deck.slide_count(), 2);
        let png = dir.path().join("c.png");
        std::fs::write(&png, b"x").unwrap();
        assert!(deck.add_image_slide(&png).is_err());
        assert_eq!(deck.slide_count(), 2);
    }
}
