//! Unit-Tests fuer den UploadService

use std::sync::Arc;

use crate::error::MediaError;
use crate::storage::DiskStorage;
use crate::upload::{content_type, dateiname_bereinigen, dateiname_pruefen, UploadService};

fn service(max_bytes: usize) -> (Arc<UploadService<DiskStorage>>, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("Temp-Verzeichnis konnte nicht erstellt werden");
    let storage = Arc::new(DiskStorage::new(dir.path()));
    (UploadService::neu(storage, max_bytes), dir)
}

#[tokio::test]
async fn hochladen_und_laden() {
    let (uploads, dir) = service(1024);

    let datei = uploads
        .hochladen(Some("Mein Song.mp3"), b"ID3")
        .await
        .unwrap();

    let (millis, rest) = datei.filename.split_once('-').unwrap();
    assert!(millis.parse::<i64>().is_ok());
    assert_eq!(rest, "Mein_Song.mp3");
    assert_eq!(datei.url, format!("/audio?file={}", datei.filename));
    assert!(dir.path().join(&datei.filename).exists());

    assert_eq!(uploads.laden(&datei.filename).await.unwrap(), b"ID3");
}

#[tokio::test]
async fn zu_grosse_datei_wird_abgelehnt() {
    let (uploads, _dir) = service(4);

    let ergebnis = uploads.hochladen(Some("gross.wav"), b"12345").await;
    assert!(matches!(
        ergebnis,
        Err(MediaError::DateiZuGross { size: 5, max: 4 })
    ));
}

#[tokio::test]
async fn leere_datei_wird_abgelehnt() {
    let (uploads, _dir) = service(4);
    assert!(matches!(
        uploads.hochladen(Some("leer.mp3"), b"").await,
        Err(MediaError::LeereDatei)
    ));
}

#[tokio::test]
async fn laden_mit_pfadanteilen_wird_abgelehnt() {
    let (uploads, _dir) = service(1024);

    for name in ["../geheim", "a/b.mp3", "a\\b.mp3", ""] {
        assert!(
            matches!(uploads.laden(name).await, Err(MediaError::UngueltigerName(_))),
            "{name} muss abgelehnt werden"
        );
    }
}

#[test]
fn dateinamen_bereinigen() {
    assert_eq!(dateiname_bereinigen("track.mp3"), "track.mp3");
    assert_eq!(dateiname_bereinigen("../../etc/passwd"), "passwd");
    assert_eq!(dateiname_bereinigen("C:\\Musik\\lied.wav"), "lied.wav");
    assert_eq!(dateiname_bereinigen(".versteckt"), "versteckt");
    assert_eq!(dateiname_bereinigen("a..b.mp3"), "a_b.mp3");
    assert_eq!(dateiname_bereinigen("Über Läuft.ogg"), "_ber_L_uft.ogg");
    assert_eq!(dateiname_bereinigen("///"), "upload");
    assert!(dateiname_pruefen(&dateiname_bereinigen("x/../y")).is_ok());
}

#[test]
fn content_type_nach_endung() {
    assert_eq!(content_type("1-a.MP3"), "audio/mpeg");
    assert_eq!(content_type("1-a.wav"), "audio/wav");
    assert_eq!(content_type("1-a.flac"), "audio/flac");
    assert_eq!(content_type("ohne_endung"), "application/octet-stream");
}
