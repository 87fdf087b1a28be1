//! JPEG 세그먼트 구조 분석
//!
//! 메타데이터 제거, 구조 무결성 검사, 임베디드 클레임 탐지에 필요한 만큼만
//! 마커 세그먼트를 순회합니다. 스캔 데이터(SOS 이후)는 해석하지 않습니다.

/// Start of image
pub const SOI: u8 = 0xD8;
/// End of image
pub const EOI: u8 = 0xD9;
/// Start of scan
pub const SOS: u8 = 0xDA;
/// JFIF 헤더 세그먼트
pub const APP0: u8 = 0xE0;
/// JUMBF 박스를 싣는 세그먼트
pub const APP11: u8 = 0xEB;
/// 주석 세그먼트
pub const COM: u8 = 0xFE;
/// 베이스라인 프레임
pub const SOF0: u8 = 0xC0;
/// 프로그레시브 프레임
pub const SOF2: u8 = 0xC2;

/// 임베디드 출처 클레임을 식별하는 레이블
pub const CLAIM_LABEL: &[u8] = b"c2pa";

/// JPEG 구조 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JpegError {
    /// SOI 마커로 시작하지 않음
    #[error("missing SOI marker")]
    MissingSoi,

    /// 마커 위치에 0xFF가 없음
    #[error("expected marker at offset {offset}")]
    ExpectedMarker { offset: usize },

    /// 세그먼트 길이가 버퍼를 벗어남
    #[error("segment 0x{marker:02X} at offset {offset} is truncated")]
    Truncated { marker: u8, offset: usize },

    /// SOS 이전에 버퍼가 끝남
    #[error("no scan data")]
    MissingScan,
}

/// 마커 세그먼트 하나
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// 마커 코드 (0xFF 다음 바이트)
    pub marker: u8,
    /// 0xFF 마커 바이트의 위치
    pub offset: usize,
    /// 마커 2바이트를 포함한 세그먼트 전체 길이
    pub len: usize,
}

impl Segment {
    /// 마커와 길이 필드를 제외한 페이로드 범위
    pub fn payload<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        let start = (self.offset + 4).min(self.offset + self.len);
        &data[start..self.offset + self.len]
    }

    fn has_length(marker: u8) -> bool {
        !matches!(marker, 0x01 | 0xD0..=0xD7 | SOI | EOI)
    }
}

/// 메타데이터 세그먼트 순회 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// SOS까지의 세그먼트 (SOS 포함)
    pub segments: Vec<Segment>,
    /// 스캔 데이터 시작 위치 (SOS 세그먼트 직후)
    pub scan_start: usize,
}

/// SOS까지 세그먼트를 순회합니다.
pub fn layout(data: &[u8]) -> Result<Layout, JpegError> {
    if data.len() < 2 || data[0] != 0xFF || data[1] != SOI {
        return Err(JpegError::MissingSoi);
    }

    let mut segments = Vec::new();
    let mut pos = 2;

    loop {
        if pos + 1 >= data.len() {
            return Err(JpegError::MissingScan);
        }
        if data[pos] != 0xFF {
            return Err(JpegError::ExpectedMarker { offset: pos });
        }

        let marker = data[pos + 1];
        // 채움 바이트
        if marker == 0xFF {
            pos += 1;
            continue;
        }

        if !Segment::has_length(marker) {
            if marker == EOI {
                return Err(JpegError::MissingScan);
            }
            segments.push(Segment {
                marker,
                offset: pos,
                len: 2,
            });
            pos += 2;
            continue;
        }

        if pos + 4 > data.len() {
            return Err(JpegError::Truncated {
                marker,
                offset: pos,
            });
        }
        let declared = usize::from(u16::from_be_bytes([data[pos + 2], data[pos + 3]]));
        let end = pos + 2 + declared;
        if declared < 2 || end > data.len() {
            return Err(JpegError::Truncated {
                marker,
                offset: pos,
            });
        }

        segments.push(Segment {
            marker,
            offset: pos,
            len: declared + 2,
        });
        pos = end;

        if marker == SOS {
            return Ok(Layout {
                segments,
                scan_start: pos,
            });
        }
    }
}

/// 구조 검사 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Inspection {
    /// SOI로 시작하고 세그먼트가 SOS까지 올바르며 EOI로 끝남
    pub well_formed: bool,
    /// 프로그레시브 프레임 여부
    pub progressive: bool,
    /// `c2pa` 레이블을 가진 APP11 세그먼트 존재 여부
    pub has_claim: bool,
}

/// 버퍼를 검사합니다. 구조가 깨진 버퍼도 에러 없이 `well_formed = false`로 보고합니다.
pub fn inspect(data: &[u8]) -> Inspection {
    match layout(data) {
        Ok(layout) => Inspection {
            well_formed: data.ends_with(&[0xFF, EOI]) && data.len() >= layout.scan_start + 2,
            progressive: layout.segments.iter().any(|s| s.marker == SOF2),
            has_claim: layout
                .segments
                .iter()
                .any(|s| is_claim_segment(s, data)),
        },
        Err(_) => Inspection {
            has_claim: scan_for_claim(data),
            ..Inspection::default()
        },
    }
}

fn is_claim_segment(segment: &Segment, data: &[u8]) -> bool {
    segment.marker == APP11
        && segment
            .payload(data)
            .windows(CLAIM_LABEL.len())
            .any(|w| w == CLAIM_LABEL)
}

/// 세그먼트 순회가 실패한 버퍼에서 온전한 클레임 세그먼트를 찾습니다.
fn scan_for_claim(data: &[u8]) -> bool {
    data.windows(2)
        .enumerate()
        .filter(|(_, w)| w[0] == 0xFF && w[1] == APP11)
        .any(|(offset, _)| {
            if offset + 4 > data.len() {
                return false;
            }
            let declared = usize::from(u16::from_be_bytes([data[offset + 2], data[offset + 3]]));
            let segment = Segment {
                marker: APP11,
                offset,
                len: declared + 2,
            };
            declared >= 2 && offset + segment.len <= data.len() && is_claim_segment(&segment, data)
        })
}

/// APP1..APP15와 COM 세그먼트를 제거합니다 (APP0 유지).
///
/// 스캔 데이터는 그대로 복사하므로 이미 제거된 버퍼에 대해서는 항등입니다.
pub fn strip_metadata(data: &[u8]) -> Result<Vec<u8>, JpegError> {
    let layout = layout(data)?;

    let mut out = Vec::with_capacity(data.len());
    out.extend_from_slice(&data[..2]);
    for segment in &layout.segments {
        let is_metadata = matches!(segment.marker, 0xE1..=0xEF | COM);
        if !is_metadata {
            out.extend_from_slice(&data[segment.offset..segment.offset + segment.len]);
        }
    }
    out.extend_from_slice(&data[layout.scan_start..]);

    Ok(out)
}
