//! Case-type codes accepted by the case-status portal.

/// `(code, description)` pairs, in the order the portal lists them.
pub const CASE_TYPES: &[(&str, &str)] = &[
    ("W.P.(C)", "Writ Petition (Civil)"),
    ("W.P.(CRL)", "Writ Petition (Criminal)"),
    ("CRL.A.", "Criminal Appeal"),
    ("CRL.M.C.", "Criminal Miscellaneous Case"),
    ("CRL.REV.P.", "Criminal Revision Petition"),
    ("C.M.", "Civil Miscellaneous"),
    ("C.S.(OS)", "Civil Suit (Original Side)"),
    ("C.S.(COMM)", "Civil Suit (Commercial)"),
    ("FAO(OS)", "First Appeal from Original Side"),
    ("FAO(COMM)", "First Appeal (Commercial)"),
    ("RFA", "Regular First Appeal"),
    ("ARB.A.", "Arbitration Appeal"),
    ("ARB.P.", "Arbitration Petition"),
    ("COMP.CAS(IB)", "Company Case (Insolvency & Bankruptcy)"),
    ("C.P.", "Company Petition"),
    ("MAT.APP.", "Mat Appeal"),
    ("L.P.A.", "Letters Patent Appeal"),
    ("C.O.", "Contempt of Court"),
    ("BAIL APPLN.", "Bail Application"),
    ("EA", "Execution Application"),
    ("EC", "Execution Case"),
    ("EP", "Election Petition"),
    ("EXE", "Execution"),
    ("GA", "General Application"),
    ("MA", "Miscellaneous Application"),
    ("O", "Original"),
    ("P", "Petition"),
    ("SA", "Second Appeal"),
    ("U", "Under"),
];

/// Whether `code` is one of the portal's case-type codes (exact match).
pub fn is_known(code: &str) -> bool {
    CASE_TYPES.iter().any(|(c, _)| *c == code)
}

/// Human-readable description for a case-type code.
pub fn describe(code: &str) -> Option<&'static str> {
    CASE_TYPES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, description)| *description)
}
