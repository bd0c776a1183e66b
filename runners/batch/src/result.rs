//! 批处理结果汇总.

use bat_berry::pipeline::{BatchResult, Outputs, RegistrationStatus};
use std::io::{self, Write};

/// 批处理最终结果.
pub struct BatchSummary {
    result: BatchResult,
    outputs: Outputs,
    entries: Vec<String>,
}

impl BatchSummary {
    pub fn new(result: BatchResult, outputs: Outputs, entries: Vec<String>) -> Self {
        Self {
            result,
            outputs,
            entries,
        }
    }

    /// 将汇总写进 `w` 中.
    fn describe_into<W: Write>(&self, w: &mut W) -> io::Result<()> {
        const S4: &str = "    ";

        let r = &self.result;
        let (n, h, wd) = r.shape();
        writeln!(w, "Batch `{}`:", r.name())?;
        writeln!(w, "{S4}Slices: {n} ({h} x {wd})")?;

        let (mut aligned, mut skipped) = (0, 0);
        let (mut brown, mut white) = (0, 0);
        for report in r.reports() {
            match report.registration {
                RegistrationStatus::Aligned { .. } => aligned += 1,
                RegistrationStatus::Skipped(_) => skipped += 1,
                RegistrationStatus::Disabled => {}
            }
            brown += report.brown_pixels;
            white += report.white_pixels;
        }
        writeln!(w, "{S4}Registered: {aligned}, skipped: {skipped}")?;
        writeln!(w, "{S4}Brown fat pixels: {brown}")?;
        writeln!(w, "{S4}White fat pixels: {white}")?;

        match (r.display_slice(), r.mask_pair()) {
            (Some(k), Some((b, wh))) => {
                let b = b.iter().filter(|&&x| x).count();
                let wh = wh.iter().filter(|&&x| x).count();
                writeln!(w, "{S4}Display slice #{k}: brown {b}, white {wh}")?;
            }
            _ => writeln!(w, "{S4}Display slice: /")?,
        }

        writeln!(w, "{S4}Output: {}", self.outputs.dir.display())?;
        writeln!(w, "{S4}Archive entries: {}", self.entries.join(", "))?;
        write!(w, "{S4}DICOM series: {}", self.outputs.series.len())?;
        Ok(())
    }

    /// 分析运行结果.
    pub fn analyze(&self) {
        utils::sep();
        let mut buf = Vec::with_capacity(512);
        self.describe_into(&mut buf).unwrap();
        println!("{}", std::str::from_utf8(&buf).unwrap());
        utils::sep();
    }
}
