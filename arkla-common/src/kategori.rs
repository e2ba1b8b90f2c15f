//! Letter categories and their field schemas
//!
//! Each category maps to one detail table (`surat_<kategori>`) whose columns
//! follow the DPRD ledger layout for that kind of letter. Table and column
//! names used in SQL come exclusively from the constants in this module.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Letter category (kategori surat)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kategori {
    /// Regular incoming letter
    MasukBiasa,
    /// Incoming invitation
    Undangan,
    /// Incoming priority letter (routed to the chairman)
    MasukPenting,
    /// Outgoing letter signed by the council
    Keluar,
    /// Outgoing letter signed by the council secretary
    KeluarSekwan,
    /// Confidential letter (audited)
    Rahasia,
}

/// Field holding the letter summary; stored on the main `surat` row.
pub const ISI_RINGKAS: &str = "isi_ringkas";

const MASUK_BIASA_FIELDS: &[&str] = &[
    "nomor_urut",
    "index_surat",
    "kode",
    "tgl_surat",
    "isi_ringkas",
    "asal_surat",
    "nomor_surat",
    "lampiran",
    "pengolah",
    "tgl_diteruskan",
    "disposisi_ketua",
    "tgl_masuk",
    "tujuan",
    "tgl_surat_turun",
    "disposisi_sekwan",
];

const UNDANGAN_FIELDS: &[&str] = &[
    "nomor_urut",
    "index_surat",
    "kode",
    "tgl_surat_masuk",
    "tgl_penyelesaian",
    "isi_ringkas",
    "asal_surat",
    "nomor_surat",
    "lampiran",
    "keterangan",
    "tgl_masuk_surat",
    "diperuntukan",
    "tgl_surat_turun",
    "disposisi_sekwan",
];

const MASUK_PENTING_FIELDS: &[&str] = &[
    "nomor_urut",
    "index_surat",
    "kode",
    "tgl_surat_masuk",
    "isi_ringkas",
    "asal_surat",
    "nomor_surat",
    "lampiran",
    "pengolah",
    "tgl_diteruskan",
    "disposisi_ketua",
    "tgl_masuk",
    "tujuan",
    "tgl_surat_turun",
    "disposisi_sekwan",
];

const KELUAR_FIELDS: &[&str] = &[
    "nomor_urut",
    "index_surat",
    "kode",
    "isi_ringkas",
    "kepada",
    "pengolah",
    "tgl_surat",
    "lampiran",
    "catatan",
];

const RAHASIA_FIELDS: &[&str] = &[
    "nomor_urut",
    "index_surat",
    "kode",
    "tgl_terima_surat",
    "isi_ringkas",
    "asal_surat",
    "nomor_surat",
    "lampiran",
    "pengolah",
    "tgl_diteruskan",
    "catatan",
];

/// Column layout of a category's spreadsheet export
#[derive(Debug, Clone, Copy)]
pub struct ExportLayout {
    /// Sheet title, also used (underscored) in the export file name
    pub title: &'static str,
    /// (database column, display header) pairs in ledger order
    pub columns: &'static [(&'static str, &'static str)],
}

const MASUK_BIASA_EXPORT: ExportLayout = ExportLayout {
    title: "Surat Masuk Biasa",
    columns: &[
        ("nomor_urut", "NOMOR URUT SURAT MASUK"),
        ("index_surat", "INDEX"),
        ("kode", "KODE"),
        ("tgl_surat", "TGL SURAT"),
        ("isi_ringkas", "ISI RINGKAS"),
        ("asal_surat", "ASAL SURAT"),
        ("nomor_surat", "NOMOR SURAT"),
        ("lampiran", "LAMPIRAN"),
        ("pengolah", "PENGOLAH"),
        ("tgl_diteruskan", "TGL DITERUSKAN"),
        ("disposisi_ketua", "CATATAN/DISPOSISI KETUA"),
        ("tgl_masuk", "TGL MASUK"),
        ("tujuan", "TUJUAN"),
        ("tgl_surat_turun", "TGL SURAT TURUN"),
        ("disposisi_sekwan", "DISPOSISI SEKWAN"),
    ],
};

const UNDANGAN_EXPORT: ExportLayout = ExportLayout {
    title: "Surat Undangan Masuk",
    columns: &[
        ("nomor_urut", "NOMOR"),
        ("index_surat", "INDEX"),
        ("kode", "KODE"),
        ("tgl_surat_masuk", "SURAT MASUK"),
        ("tgl_penyelesaian", "TGL.PENYLSN"),
        ("isi_ringkas", "ISI RINGKAS"),
        ("asal_surat", "ASAL SURAT"),
        ("nomor_surat", "NOMOR SURAT"),
        ("lampiran", "LAMPIRAN"),
        ("keterangan", "KET"),
        ("tgl_masuk_surat", "TGL MASUK SURAT"),
        ("diperuntukan", "DIPERUNTUKAN"),
        ("tgl_surat_turun", "TGL SURAT TURUN"),
        ("disposisi_sekwan", "DISPOSISI SEKWAN"),
    ],
};

const MASUK_PENTING_EXPORT: ExportLayout = ExportLayout {
    title: "Surat Masuk Penting",
    columns: &[
        ("nomor_urut", "NOMOR URUT SURAT MASUK"),
        ("index_surat", "INDEX"),
        ("kode", "KODE"),
        ("tgl_surat_masuk", "TGL SURAT MASUK"),
        ("isi_ringkas", "ISI RINGKAS"),
        ("asal_surat", "ASAL SURAT"),
        ("nomor_surat", "NOMOR SURAT"),
        ("lampiran", "LAMPIRAN"),
        ("pengolah", "PENGOLAH"),
        ("tgl_diteruskan", "TGL DITERUSKAN"),
        ("disposisi_ketua", "CATATAN/DISPOSISI KETUA"),
        ("tgl_masuk", "TGL MASUK"),
        ("tujuan", "TUJUAN"),
        ("tgl_surat_turun", "TGL SURAT TURUN"),
        ("disposisi_sekwan", "DISPOSISI SEKWAN"),
    ],
};

const KELUAR_COLUMNS: &[(&str, &str)] = &[
    ("nomor_urut", "NOMOR_URUT"),
    ("index_surat", "INDEX"),
    ("kode", "KODE"),
    ("isi_ringkas", "ISI_RINGKAS"),
    ("kepada", "KEPADA"),
    ("pengolah", "PENGOLAH"),
    ("tgl_surat", "TGL_SURAT"),
    ("lampiran", "LAMPIRAN"),
    ("catatan", "CATATAN"),
];

const KELUAR_EXPORT: ExportLayout = ExportLayout {
    title: "Surat Keluar DPRD",
    columns: KELUAR_COLUMNS,
};

const KELUAR_SEKWAN_EXPORT: ExportLayout = ExportLayout {
    title: "Surat Keluar Sekretaris DPRD",
    columns: KELUAR_COLUMNS,
};

const RAHASIA_EXPORT: ExportLayout = ExportLayout {
    title: "Surat Rahasia",
    columns: &[
        ("nomor_urut", "NOMOR URUT"),
        ("index_surat", "INDEX"),
        ("kode", "KODE"),
        ("isi_ringkas", "ISI RINGKAS"),
        ("asal_surat", "ASAL SURAT"),
        ("nomor_surat", "NOMOR SURAT"),
        ("lampiran", "LAMPIRAN"),
        ("pengolah", "PENGOLAH"),
        ("tgl_diteruskan", "TGL DITERUSKAN"),
        ("catatan", "CATATAN"),
        ("tgl_terima_surat", "TGL TERIMA SURAT"),
    ],
};

impl Kategori {
    /// All categories in display order
    pub const ALL: [Kategori; 6] = [
        Kategori::MasukBiasa,
        Kategori::Undangan,
        Kategori::MasukPenting,
        Kategori::Keluar,
        Kategori::KeluarSekwan,
        Kategori::Rahasia,
    ];

    /// Wire value (`masuk_biasa`, `undangan`, ...)
    pub const fn as_str(self) -> &'static str {
        match self {
            Kategori::MasukBiasa => "masuk_biasa",
            Kategori::Undangan => "undangan",
            Kategori::MasukPenting => "masuk_penting",
            Kategori::Keluar => "keluar",
            Kategori::KeluarSekwan => "keluar_sekwan",
            Kategori::Rahasia => "rahasia",
        }
    }

    /// Human-readable label used in prompts and printed sheets
    pub const fn label(self) -> &'static str {
        match self {
            Kategori::MasukBiasa => "surat masuk biasa",
            Kategori::Undangan => "surat undangan",
            Kategori::MasukPenting => "surat masuk penting",
            Kategori::Keluar => "surat keluar",
            Kategori::KeluarSekwan => "surat keluar sekwan",
            Kategori::Rahasia => "surat rahasia",
        }
    }

    /// Name of the category's detail table
    pub const fn table_name(self) -> &'static str {
        match self {
            Kategori::MasukBiasa => "surat_masuk_biasa",
            Kategori::Undangan => "surat_undangan",
            Kategori::MasukPenting => "surat_masuk_penting",
            Kategori::Keluar => "surat_keluar",
            Kategori::KeluarSekwan => "surat_keluar_sekwan",
            Kategori::Rahasia => "surat_rahasia",
        }
    }

    /// Every field the category records, in ledger order (includes `isi_ringkas`)
    pub const fn fields(self) -> &'static [&'static str] {
        match self {
            Kategori::MasukBiasa => MASUK_BIASA_FIELDS,
            Kategori::Undangan => UNDANGAN_FIELDS,
            Kategori::MasukPenting => MASUK_PENTING_FIELDS,
            Kategori::Keluar | Kategori::KeluarSekwan => KELUAR_FIELDS,
            Kategori::Rahasia => RAHASIA_FIELDS,
        }
    }

    /// Columns of the detail table (every field except `isi_ringkas`)
    pub fn detail_columns(self) -> impl Iterator<Item = &'static str> {
        self.fields().iter().copied().filter(|f| *f != ISI_RINGKAS)
    }

    /// Whether the category records the given field
    pub fn has_field(self, field: &str) -> bool {
        self.fields().contains(&field)
    }

    /// The field holding the letter's own date, shown in list views
    pub const fn primary_date_field(self) -> &'static str {
        match self {
            Kategori::MasukBiasa | Kategori::Keluar | Kategori::KeluarSekwan => "tgl_surat",
            Kategori::Undangan | Kategori::MasukPenting => "tgl_surat_masuk",
            Kategori::Rahasia => "tgl_terima_surat",
        }
    }

    /// Spreadsheet layout for exports
    pub const fn export_layout(self) -> ExportLayout {
        match self {
            Kategori::MasukBiasa => MASUK_BIASA_EXPORT,
            Kategori::Undangan => UNDANGAN_EXPORT,
            Kategori::MasukPenting => MASUK_PENTING_EXPORT,
            Kategori::Keluar => KELUAR_EXPORT,
            Kategori::KeluarSekwan => KELUAR_SEKWAN_EXPORT,
            Kategori::Rahasia => RAHASIA_EXPORT,
        }
    }

    /// Confidential letters get an audit trail
    pub const fn is_audited(self) -> bool {
        matches!(self, Kategori::Rahasia)
    }

    /// Comma-separated list of valid wire values, for error messages
    pub fn valid_values() -> String {
        Self::ALL
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Whether a field holds a date (`tgl_*`, `tanggal*`)
pub fn is_date_field(field: &str) -> bool {
    field.starts_with("tgl") || field.contains("tanggal")
}

impl fmt::Display for Kategori {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kategori {
    type Err = Error;

    /// Accepts the wire value case-insensitively, with spaces in place of underscores
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(' ', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| Error::InvalidKategori(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wire_values() {
        for kategori in Kategori::ALL {
            assert_eq!(kategori.as_str().parse::<Kategori>().unwrap(), kategori);
        }
    }

    #[test]
    fn test_parse_is_lenient_about_case_and_spaces() {
        assert_eq!("Masuk Biasa".parse::<Kategori>().unwrap(), Kategori::MasukBiasa);
        assert_eq!(" KELUAR_SEKWAN ".parse::<Kategori>().unwrap(), Kategori::KeluarSekwan);
    }

    #[test]
    fn test_parse_rejects_unknown() {
        let err = "surat_cinta".parse::<Kategori>().unwrap_err();
        assert!(matches!(err, Error::InvalidKategori(_)));
    }

    #[test]
    fn test_serde_uses_wire_values() {
        let json = serde_json::to_string(&Kategori::KeluarSekwan).unwrap();
        assert_eq!(json, "\"keluar_sekwan\"");
        let back: Kategori = serde_json::from_str("\"masuk_penting\"").unwrap();
        assert_eq!(back, Kategori::MasukPenting);
    }

    #[test]
    fn test_detail_columns_exclude_summary() {
        for kategori in Kategori::ALL {
            assert!(kategori.has_field(ISI_RINGKAS));
            assert!(kategori.detail_columns().all(|c| c != ISI_RINGKAS));
            assert_eq!(kategori.detail_columns().count(), kategori.fields().len() - 1);
        }
    }

    #[test]
    fn test_category_specific_fields() {
        assert!(Kategori::Keluar.has_field("kepada"));
        assert!(Kategori::Keluar.has_field("pengolah"));
        assert!(!Kategori::Keluar.has_field("asal_surat"));
        assert!(Kategori::MasukPenting.has_field("disposisi_ketua"));
        assert!(!Kategori::Rahasia.has_field("disposisi_ketua"));
    }

    #[test]
    fn test_primary_date_field_belongs_to_schema() {
        for kategori in Kategori::ALL {
            assert!(kategori.has_field(kategori.primary_date_field()));
        }
    }

    #[test]
    fn test_export_layout_columns_belong_to_schema() {
        for kategori in Kategori::ALL {
            let layout = kategori.export_layout();
            for (column, header) in layout.columns {
                assert!(kategori.has_field(column), "{} lacks {}", kategori, column);
                assert!(!header.is_empty());
            }
        }
    }

    #[test]
    fn test_only_rahasia_is_audited() {
        let audited: Vec<_> = Kategori::ALL.iter().filter(|k| k.is_audited()).collect();
        assert_eq!(audited, vec![&Kategori::Rahasia]);
    }

    #[test]
    fn test_is_date_field() {
        assert!(is_date_field("tgl_surat"));
        assert!(is_date_field("tgl_terima_surat"));
        assert!(!is_date_field("nomor_surat"));
    }
}
