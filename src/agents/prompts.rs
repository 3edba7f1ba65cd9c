//! Static system directives and user templates for every agent.

use super::traits::RecruitingInput;

pub const JOB_PARSER_SYSTEM: &str = "You are an expert HR analyst specializing in parsing job descriptions.
Extract and structure key information from job descriptions.
Return ONLY valid JSON with these exact fields: job_title, experience_level, employment_type,
required_skills (array), nice_to_have_skills (array), responsibilities (array), qualifications (array).";

pub const SOURCING_SYSTEM: &str = "You are an expert talent acquisition specialist.
Create comprehensive candidate sourcing strategies.
Return ONLY valid JSON with these exact fields: platforms (array of {name, reason}),
search_keywords (array), sourcing_channels (array), outreach_strategy (string), timeline (string).";

pub const SCREENING_SYSTEM: &str = "You are an expert HR interviewer.
Create comprehensive screening criteria and questions.
Return ONLY valid JSON with: must_have_criteria (array), nice_to_have_criteria (array),
screening_questions (array), technical_assessment (string), evaluation_rubric (string).";

pub const COMPENSATION_SYSTEM: &str = "You are an expert compensation analyst.
Analyze market data and create competitive compensation packages.
Return ONLY valid JSON with: market_analysis (string), recommended_salary_range ({min, max}),
target_salary (number), benefits_package (array), equity_structure (string), justification (string).";

pub const OFFER_LETTER_SYSTEM: &str = "You are an expert HR professional creating offer letters.
Generate professional, comprehensive offer letters with all necessary details and legal language.";

pub const CANDIDATE_OFFER_SYSTEM: &str = "You are an expert HR professional specializing in offer letters.
Generate a professional, warm, and legally sound offer letter.

Include:
- Warm welcome
- Position details
- Compensation and benefits
- Start date
- Reporting structure
- Next steps
- Standard legal disclaimers

Use professional business letter format.";

pub const RESUME_SCREENER_SYSTEM: &str = "You are an expert technical recruiter and resume screener.
Your task is to evaluate how well a candidate's resume matches a job description.

Analyze:
1. Skills match (technical and soft skills)
2. Experience level and relevance
3. Education and qualifications
4. Overall cultural and role fit

Provide:
- score: Overall match score from 0-100
- strengths: List of 3-5 key strengths
- weaknesses: List of 3-5 gaps or concerns
- recommendation: \"HIRE\", \"MAYBE\", or \"REJECT\"
- reasoning: Brief explanation of your decision

Be objective and thorough. Return response as JSON.";

pub fn job_parser_user(input: &RecruitingInput) -> String {
    format!(
        "Analyze this job description:\n\nJob Description: {jd}\nDepartment: {department}\n\nProvide comprehensive analysis in JSON format.",
        jd = input.job_description.trim(),
        department = input.department_or_default(),
    )
}

pub fn sourcing_user(input: &RecruitingInput) -> String {
    format!(
        "Create sourcing strategy for:\n\nJob Description: {}\n\nProvide platforms, keywords, channels, outreach strategy, and timeline in JSON.",
        input.job_description.trim()
    )
}

pub fn screening_user(input: &RecruitingInput) -> String {
    format!(
        "Create screening materials for:\n\nJob Description: {}\n\nInclude criteria, questions, assessment, and rubric in JSON.",
        input.job_description.trim()
    )
}

pub fn compensation_user(input: &RecruitingInput) -> String {
    format!(
        "Create compensation package for:\n\nJob Description: {jd}\nBudget Range: ${min} - ${max}\n\nProvide analysis, salary, benefits, equity, and justification in JSON.",
        jd = input.job_description.trim(),
        min = format_thousands(input.min_salary),
        max = format_thousands(input.max_salary),
    )
}

pub fn offer_letter_user(
    input: &RecruitingInput,
    job_title: &str,
    target_salary: i64,
    benefits: &str,
) -> String {
    format!(
        "Generate professional offer letter:\n\nCompany: {company}\nDepartment: {department}\nJob Title: {job_title}\nSalary: ${salary}\n\nJob Description: {jd}\n\nBenefits: {benefits}\n\nInclude: company header, position details, compensation, benefits, start date (TBD),\ncontingencies, and signature section.",
        company = input.company_name.trim(),
        department = input.department_or_default(),
        salary = format_thousands(target_salary),
        jd = input.job_description.trim(),
    )
}

pub fn candidate_offer_user(
    candidate_name: &str,
    job_title: &str,
    company_name: &str,
    salary: i64,
    start_date: &str,
    benefits: Option<&str>,
    equity: Option<&str>,
) -> String {
    let mut extras = String::new();
    if let Some(benefits) = benefits.map(str::trim).filter(|b| !b.is_empty()) {
        extras.push_str(&format!("\nBenefits: {benefits}"));
    }
    if let Some(equity) = equity.map(str::trim).filter(|e| !e.is_empty()) {
        extras.push_str(&format!("\nEquity: {equity}"));
    }

    format!(
        "Generate an offer letter with:\n- Candidate: {candidate_name}\n- Position: {job_title}\n- Company: {company_name}\n- Salary: ${salary} per year\n- Start Date: {start_date}{extras}\n\nMake it professional yet welcoming.",
        salary = format_thousands(salary),
    )
}

pub fn resume_screener_user(jd_text: &str, resume_text: &str, key_requirements: Option<&str>) -> String {
    let requirements = key_requirements
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(|r| format!("Key Requirements: {r}\n\n"))
        .unwrap_or_default();

    format!(
        "Job Description:\n{}\n\n{requirements}Resume:\n{}\n\nEvaluate this candidate's fit for the role.",
        jd_text.trim(),
        resume_text.trim()
    )
}

/// `1234567` -> `1,234,567`; negatives keep their sign.
pub fn format_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> RecruitingInput {
        RecruitingInput {
            job_description: "  Senior Python Developer with Django and AWS.  ".to_string(),
            company_name: "TechCorp Inc.".to_string(),
            department: "   ".to_string(),
            min_salary: 120_000,
            max_salary: 160_000,
        }
    }

    #[test]
    fn thousands_separators() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(120_000), "120,000");
        assert_eq!(format_thousands(1_234_567), "1,234,567");
        assert_eq!(format_thousands(-45_000), "-45,000");
    }

    #[test]
    fn compensation_prompt_carries_budget() {
        let prompt = compensation_user(&input());
        assert!(prompt.contains("Budget Range: $120,000 - $160,000"));
        assert!(prompt.contains("Job Description: Senior Python Developer"));
    }

    #[test]
    fn offer_prompt_carries_role_and_description() {
        let prompt = offer_letter_user(&input(), "Backend Engineer", 140_000, "Health, PTO");
        assert!(prompt.contains("Company: TechCorp Inc.\nDepartment: General\nJob Title: Backend Engineer"));
        assert!(prompt.contains("Salary: $140,000"));
        assert!(prompt.contains("Job Description: Senior Python Developer with Django and AWS.\n\nBenefits: Health, PTO"));
    }

    #[test]
    fn blank_department_defaults_to_general() {
        assert!(job_parser_user(&input()).contains("Department: General"));
    }

    #[test]
    fn candidate_offer_lists_only_given_extras() {
        let prompt = candidate_offer_user("Ada", "SRE", "Acme", 150_000, "2025-01-06", None, Some("0.1%"));
        assert!(prompt.contains("- Salary: $150,000 per year"));
        assert!(prompt.contains("- Start Date: 2025-01-06\nEquity: 0.1%"));
        assert!(!prompt.contains("Benefits:"));
    }

    #[test]
    fn screener_prompt_omits_empty_requirements() {
        let prompt = resume_screener_user("JD", "Resume", Some("  "));
        assert!(!prompt.contains("Key Requirements"));
        let prompt = resume_screener_user("JD", "Resume", Some("Title: SRE"));
        assert!(prompt.contains("Key Requirements: Title: SRE"));
    }
}
