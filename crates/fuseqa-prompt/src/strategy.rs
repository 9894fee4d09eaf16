//! Prompt strategy selection and context assembly.
//!
//! Each domain maps to a fixed template carrying the analyst role, the
//! domain's special-attention rules, and a structured JSON answer
//! contract. Assembly is a pure function: it fills placeholders and
//! budgets context greedily, performing no I/O.

use std::collections::HashMap;

use fuseqa_core::{Domain, DomainLabel, FusedCandidate, PromptStrategy};

/// Bumped whenever a built-in template changes meaning.
pub const PROMPT_LIBRARY_VERSION: u32 = 1;

/// Default context budget, in characters of snippet text.
const DEFAULT_CONTEXT_BUDGET: usize = 6000;

const FINANCIAL_TEMPLATE: &str = r#"You are a professional financial analyst reviewing annual reports and financial statements.
Answer the question using only the provided document context.

Special attention:
1. For numeric questions, match the metric definition and unit of measure exactly.
2. Distinguish totals, net amounts, ratios and percentages.
3. Respect the reporting period and accounting basis of every figure.
4. If the answer would require a calculation or derivation the context does not provide, answer "N/A".

Context:
"{context}"

---

Question:
"{question}"

Respond with JSON in the following shape:
{
  "step_by_step_analysis": "numbered reasoning: identify the metric, locate it in the context, verify unit and period, conclude",
  "reasoning_summary": "one or two sentences summarising the analysis",
  "relevant_pages": [1],
  "final_answer": "the exact value or statement, or \"N/A\" if the context cannot answer"
}"#;

const LEGAL_TEMPLATE: &str = r#"You are a professional legal analyst reviewing contracts and legal documents.
Interpret the relevant provisions using only the provided document context.

Special attention:
1. Interpret clauses strictly as written; never speculate or assume.
2. Note validity periods, conditions of applicability and exceptions.
3. Distinguish rights, obligations and remedies for breach.
4. If the question falls outside the documents, answer "N/A".

Context:
"{context}"

---

Question:
"{question}"

Respond with JSON in the following shape:
{
  "step_by_step_analysis": "numbered reasoning: identify the legal concept, locate the governing clause, check applicability, conclude",
  "reasoning_summary": "one or two sentences summarising the analysis",
  "relevant_pages": [1],
  "final_answer": "the interpretation grounded in the documents, or \"N/A\" if the context cannot answer"
}"#;

const TECHNICAL_TEMPLATE: &str = r#"You are a technical expert reviewing technical and API documentation.
Answer the implementation question using only the provided document context.

Special attention:
1. Answer strictly from the documented specification.
2. Note versions, compatibility constraints and dependencies.
3. Distinguish concept explanations, usage instructions and recommended practice.
4. If the implementation detail is not documented, answer "N/A".

Context:
"{context}"

---

Question:
"{question}"

Respond with JSON in the following shape:
{
  "step_by_step_analysis": "numbered reasoning: identify the technical area, locate the relevant documentation, verify it applies, conclude",
  "reasoning_summary": "one or two sentences summarising the analysis",
  "relevant_pages": [1],
  "final_answer": "the documented answer, or \"N/A\" if the context cannot answer"
}"#;

const ACADEMIC_TEMPLATE: &str = r#"You are a researcher reviewing academic papers.
Answer the research question using only the provided document context.

Special attention:
1. Stay within what the paper states; never extrapolate beyond it.
2. Distinguish conclusions, hypotheses, methodology and stated limitations.
3. Note the scope and conditions under which findings hold.
4. If the paper does not discuss the matter sufficiently, answer "N/A".

Context:
"{context}"

---

Question:
"{question}"

Respond with JSON in the following shape:
{
  "step_by_step_analysis": "numbered reasoning: identify the research area, locate the relevant passages, assess their reliability, conclude",
  "reasoning_summary": "one or two sentences summarising the analysis",
  "relevant_pages": [1],
  "final_answer": "the answer grounded in the paper, or \"N/A\" if the context cannot answer"
}"#;

const GENERIC_TEMPLATE: &str = r#"You are a professional content analyst.
Answer the question using only the provided document context.

Context:
"{context}"

---

Question:
"{question}"

Respond with JSON in the following shape:
{
  "step_by_step_analysis": "numbered reasoning: understand the question, locate the relevant information, verify it, conclude",
  "reasoning_summary": "one or two sentences summarising the analysis",
  "relevant_pages": [1],
  "final_answer": "the answer grounded in the context, or \"N/A\" if the context cannot answer"
}"#;

/// The fixed, read-only mapping from domain to prompt strategy.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    strategies: HashMap<Domain, PromptStrategy>,
    generic: PromptStrategy,
}

impl PromptLibrary {
    /// The built-in strategy set.
    pub fn builtin() -> Self {
        let strategy = |domain: Domain, template: &str| PromptStrategy {
            domain,
            template: template.to_string(),
            max_context_chars: DEFAULT_CONTEXT_BUDGET,
        };

        let mut strategies = HashMap::new();
        strategies.insert(Domain::Financial, strategy(Domain::Financial, FINANCIAL_TEMPLATE));
        strategies.insert(Domain::Legal, strategy(Domain::Legal, LEGAL_TEMPLATE));
        strategies.insert(Domain::Technical, strategy(Domain::Technical, TECHNICAL_TEMPLATE));
        strategies.insert(Domain::Academic, strategy(Domain::Academic, ACADEMIC_TEMPLATE));

        Self {
            strategies,
            generic: strategy(Domain::Generic, GENERIC_TEMPLATE),
        }
    }

    /// Look up the strategy for a domain, falling back to the generic
    /// entry. Never fails.
    pub fn strategy(&self, domain: Domain) -> &PromptStrategy {
        self.strategies.get(&domain).unwrap_or(&self.generic)
    }

    /// Replace every strategy's context budget.
    pub fn with_context_budget(mut self, max_context_chars: usize) -> Self {
        for strategy in self.strategies.values_mut() {
            strategy.max_context_chars = max_context_chars;
        }
        self.generic.max_context_chars = max_context_chars;
        self
    }

    /// Fill the domain's template with the query and the budgeted
    /// context block.
    pub fn assemble(
        &self,
        query: &str,
        label: &DomainLabel,
        sources: &[FusedCandidate],
    ) -> String {
        let strategy = self.strategy(label.domain);
        fill_template(strategy, query, sources, strategy.max_context_chars)
    }

    /// Like [`assemble`](Self::assemble), with an explicit context
    /// budget overriding the strategy's own.
    pub fn assemble_with_budget(
        &self,
        query: &str,
        label: &DomainLabel,
        sources: &[FusedCandidate],
        max_context_chars: usize,
    ) -> String {
        let strategy = self.strategy(label.domain);
        fill_template(strategy, query, sources, max_context_chars)
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

fn fill_template(
    strategy: &PromptStrategy,
    query: &str,
    sources: &[FusedCandidate],
    max_context_chars: usize,
) -> String {
    let context = build_context(sources, max_context_chars);
    // Literal token replacement: the templates contain JSON braces, so
    // no format machinery is applicable.
    strategy
        .template
        .replace("{context}", &context)
        .replace("{question}", query)
}

/// Greedily append snippet text, highest-ranked first, until the next
/// snippet would exceed the budget. Budget counts snippet characters
/// only; separators are free. Sources dropped here are still reported
/// in `ranked_sources` for citation.
fn build_context(sources: &[FusedCandidate], max_context_chars: usize) -> String {
    let mut parts: Vec<&str> = Vec::new();
    let mut used = 0usize;

    for source in sources {
        let len = source.text.chars().count();
        if used + len > max_context_chars {
            break;
        }
        used += len;
        parts.push(source.text.as_str());
    }

    parts.join("\n\n")
}
