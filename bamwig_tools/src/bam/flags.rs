use bitflags::bitflags;

bitflags! {
    /// SAM FLAG field.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Flags: u16 {
        /// The read is paired in sequencing, no matter whether it is mapped in a pair.
        const PAIRED =        1;
        /// The read is mapped in a proper pair.
        const PROPER_PAIR =   2;
        /// The read itself is unmapped; conflictive with PROPER_PAIR.
        const UNMAPPED =      4;
        /// The mate is unmapped.
        const MATE_UNMAPPED = 8;
        /// The read is mapped to the reverse strand.
        const REVERSE =      16;
        /// The mate is mapped to the reverse strand.
        const MATE_REVERSE = 32;
        /// This is read1.
        const READ1 =        64;
        /// This is read2.
        const READ2 =       128;
        /// Not primary alignment.
        const SECONDARY =   256;
        /// QC failure.
        const QC_FAIL =     512;
        /// Optical or PCR duplicate.
        const DUPLICATE =  1024;
        /// Supplementary alignment.
        const SUPPLEMENTARY = 2048;
    }
}

impl Flags {
    pub fn is_paired(self) -> bool {
        self.contains(Flags::PAIRED)
    }

    pub fn is_proper_pair(self) -> bool {
        self.contains(Flags::PROPER_PAIR)
    }

    pub fn is_unmapped(self) -> bool {
        self.contains(Flags::UNMAPPED)
    }

    pub fn is_mate_unmapped(self) -> bool {
        self.contains(Flags::MATE_UNMAPPED)
    }

    pub fn is_reverse(self) -> bool {
        self.contains(Flags::REVERSE)
    }

    pub fn is_mate_reverse(self) -> bool {
        self.contains(Flags::MATE_REVERSE)
    }

    pub fn is_first_in_pair(self) -> bool {
        self.contains(Flags::READ1)
    }

    pub fn is_second_in_pair(self) -> bool {
        self.contains(Flags::READ2)
    }

    pub fn is_secondary(self) -> bool {
        self.contains(Flags::SECONDARY)
    }

    pub fn is_qc_fail(self) -> bool {
        self.contains(Flags::QC_FAIL)
    }

    pub fn is_duplicate(self) -> bool {
        self.contains(Flags::DUPLICATE)
    }

    pub fn is_supplementary(self) -> bool {
        self.contains(Flags::SUPPLEMENTARY)
    }
}
